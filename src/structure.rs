//! Schema changes.
//!
//! DDL text comes from a [`SqlGenerator`], built lazily the first time a connection
//! needs one and looked up by the `<family>_sql_generator` name. Statements run through
//! the ordinary instrumentation path as [`QueryType::Structure`] and clear the metadata
//! caches afterwards.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::database::Database;
use crate::error::DmlError;
use crate::translation::{NormalizedQuery, fix_table_names};
use crate::types::{DatabaseType, ParamStyle, Params, QueryType, RowValues};

/// Column kinds a generator can map to engine types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    /// Fixed precision with this many total and fractional digits.
    Number { precision: u8, scale: u8 },
    Float,
    /// Variable length character data of at most this many characters.
    Char(u32),
    Text,
    Binary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub not_null: bool,
    pub default: Option<RowValues>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            not_null: false,
            default: None,
        }
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<RowValues>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// A table with an auto-increment `id` primary key plus `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    /// Table name without prefix.
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }
}

/// Produces DDL for one engine family.
///
/// Table names are emitted in `{name}` form; the prefix is applied when the statements
/// run.
pub trait SqlGenerator {
    fn family(&self) -> DatabaseType;

    /// Name used in structure errors, `<family>_sql_generator`.
    fn name(&self) -> String {
        generator_name(self.family())
    }

    fn create_table_sql(&self, table: &TableSpec) -> Vec<String>;

    fn drop_table_sql(&self, table: &str) -> Vec<String> {
        vec![format!("DROP TABLE {{{table}}}")]
    }
}

/// Generator covering the column kinds of [`FieldKind`] for every bundled family.
#[derive(Debug, Clone, Copy)]
pub struct StandardSqlGenerator {
    family: DatabaseType,
}

impl StandardSqlGenerator {
    #[must_use]
    pub fn new(family: DatabaseType) -> Self {
        Self { family }
    }

    fn id_column(&self) -> &'static str {
        match self.family {
            DatabaseType::Sqlite => "id INTEGER PRIMARY KEY AUTOINCREMENT",
            DatabaseType::Postgres => "id BIGSERIAL PRIMARY KEY",
            DatabaseType::Mysql => "id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY",
            DatabaseType::Mssql => "id BIGINT IDENTITY(1,1) PRIMARY KEY",
        }
    }

    fn column_type(&self, kind: FieldKind) -> String {
        match (self.family, kind) {
            (DatabaseType::Sqlite, FieldKind::Integer) => "INTEGER".to_string(),
            (_, FieldKind::Integer) => "BIGINT".to_string(),
            (_, FieldKind::Number { precision, scale }) => {
                format!("NUMERIC({precision},{scale})")
            }
            (DatabaseType::Sqlite, FieldKind::Float) => "REAL".to_string(),
            (DatabaseType::Postgres, FieldKind::Float) => "DOUBLE PRECISION".to_string(),
            (DatabaseType::Mysql, FieldKind::Float) => "DOUBLE".to_string(),
            (DatabaseType::Mssql, FieldKind::Float) => "FLOAT".to_string(),
            (DatabaseType::Mssql, FieldKind::Char(len)) => format!("NVARCHAR({len})"),
            (_, FieldKind::Char(len)) => format!("VARCHAR({len})"),
            (DatabaseType::Mysql, FieldKind::Text) => "LONGTEXT".to_string(),
            (DatabaseType::Mssql, FieldKind::Text) => "NVARCHAR(MAX)".to_string(),
            (_, FieldKind::Text) => "TEXT".to_string(),
            (DatabaseType::Postgres, FieldKind::Binary) => "BYTEA".to_string(),
            (DatabaseType::Mysql, FieldKind::Binary) => "LONGBLOB".to_string(),
            (DatabaseType::Mssql, FieldKind::Binary) => "VARBINARY(MAX)".to_string(),
            (_, FieldKind::Binary) => "BLOB".to_string(),
        }
    }

    fn column_sql(&self, field: &FieldSpec) -> String {
        let mut sql = format!("{} {}", field.name, self.column_type(field.kind));
        if field.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &field.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&literal(default));
        }
        sql
    }
}

impl SqlGenerator for StandardSqlGenerator {
    fn family(&self) -> DatabaseType {
        self.family
    }

    fn create_table_sql(&self, table: &TableSpec) -> Vec<String> {
        let mut columns = vec![self.id_column().to_string()];
        columns.extend(table.fields.iter().map(|f| self.column_sql(f)));
        vec![format!(
            "CREATE TABLE {{{}}} ({})",
            table.name,
            columns.join(", ")
        )]
    }
}

/// SQL literal for a default value.
fn literal(value: &RowValues) -> String {
    match value {
        RowValues::Null => "NULL".to_string(),
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) => f.to_string(),
        RowValues::Bool(b) => i64::from(*b).to_string(),
        other => format!("'{}'", other.to_key().replace('\'', "''")),
    }
}

type GeneratorFactory = fn(DatabaseType) -> Box<dyn SqlGenerator>;

fn standard_generator(family: DatabaseType) -> Box<dyn SqlGenerator> {
    Box::new(StandardSqlGenerator::new(family))
}

lazy_static! {
    static ref GENERATORS: HashMap<String, GeneratorFactory> = [
        DatabaseType::Sqlite,
        DatabaseType::Postgres,
        DatabaseType::Mysql,
        DatabaseType::Mssql,
    ]
    .into_iter()
    .map(|family| (generator_name(family), standard_generator as GeneratorFactory))
    .collect();
}

fn generator_name(family: DatabaseType) -> String {
    format!("{}_sql_generator", family.family())
}

/// The generator registered for `family`.
#[must_use]
pub fn sql_generator_for(family: DatabaseType) -> Box<dyn SqlGenerator> {
    GENERATORS
        .get(&generator_name(family))
        .map_or_else(|| standard_generator(family), |factory| factory(family))
}

impl Database {
    /// This connection's DDL generator, built on first use.
    pub(crate) fn sql_generator(&mut self) -> &dyn SqlGenerator {
        let family = self.driver.family();
        &**self
            .generator
            .get_or_insert_with(|| sql_generator_for(family))
    }

    /// Replace the DDL generator, e.g. with one that knows engine-specific types.
    pub fn set_sql_generator(&mut self, generator: Box<dyn SqlGenerator>) {
        self.generator = Some(generator);
    }

    /// Run DDL statements in order, stopping at the first failure. The metadata caches
    /// are cleared either way.
    ///
    /// # Errors
    /// Returns `DmlError::StructureError` naming the generator and failed statement.
    pub fn change_database_structure(&mut self, statements: &[String]) -> Result<(), DmlError> {
        let style = self.driver.allowed_param_types().preferred();
        let outcome = statements.iter().try_for_each(|statement| {
            let query = NormalizedQuery {
                sql: fix_table_names(statement, &self.config.prefix).into_owned(),
                params: if style == ParamStyle::Named {
                    Params::Named(std::collections::BTreeMap::new())
                } else {
                    Params::none()
                },
                style,
            };
            self.query_start(&query.sql, &query.params, QueryType::Structure);
            let result = self.driver.execute(&query);
            self.query_end(result).map(|_| ())
        });
        self.reset_caches();
        outcome
    }

    /// # Errors
    /// See [`Database::change_database_structure`].
    pub fn create_table(&mut self, table: &TableSpec) -> Result<(), DmlError> {
        let statements = self.sql_generator().create_table_sql(table);
        self.change_database_structure(&statements)
    }

    /// # Errors
    /// See [`Database::change_database_structure`].
    pub fn drop_table(&mut self, table: &str) -> Result<(), DmlError> {
        let statements = self.sql_generator().drop_table_sql(table);
        self.change_database_structure(&statements)
    }
}

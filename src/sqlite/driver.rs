use std::time::Duration;

use rusqlite::Connection;
use serde_json::Value as JsonValue;

use super::params::Params;
use super::query::build_records;
use crate::config::ConnectionConfig;
use crate::driver::{ColumnInfo, Driver, IndexInfo, MetaType, ServerInfo};
use crate::error::DmlError;
use crate::recordset::{BufferedCursor, Cursor};
use crate::translation::NormalizedQuery;
use crate::types::{DatabaseType, ParamStyles, RowValues};

/// `SQLite` through rusqlite. Rows are fetched eagerly into a [`BufferedCursor`].
///
/// An empty `dbname` (or `:memory:`) opens a private in-memory database; anything else
/// is a file path. Recognized options: `journal_mode` (e.g. `"wal"`) and
/// `busy_timeout_ms`.
#[derive(Debug, Default)]
pub struct SqliteDriver {
    conn: Option<Connection>,
    last_error: Option<String>,
}

impl SqliteDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// [`crate::driver::DriverFactory`] for the registry.
    ///
    /// # Errors
    /// Never fails; the connection is opened by `connect`.
    pub fn factory(_config: &ConnectionConfig) -> Result<Box<dyn Driver>, DmlError> {
        Ok(Box::new(Self::new()))
    }

    /// Run `f` against the open connection, remembering its error text.
    fn run<T, F>(&mut self, f: F) -> Result<T, DmlError>
    where
        F: FnOnce(&Connection) -> Result<T, DmlError>,
    {
        let result = match &self.conn {
            Some(conn) => f(conn),
            None => Err(DmlError::ConnectionError(
                "sqlite connection is not open".to_string(),
            )),
        };
        self.last_error = result.as_ref().err().map(ToString::to_string);
        result
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column class from a declared type, following `SQLite`'s affinity rules.
fn meta_type(type_name: &str) -> MetaType {
    let upper = type_name.to_ascii_uppercase();
    if upper.contains("INT") {
        MetaType::Integer
    } else if upper.contains("CHAR") {
        MetaType::Char
    } else if upper.contains("CLOB") || upper.contains("TEXT") {
        MetaType::Text
    } else if upper.contains("BLOB") || upper.is_empty() {
        MetaType::Binary
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        MetaType::Float
    } else {
        MetaType::Number
    }
}

/// `n` from `VARCHAR(n)` or `NUMERIC(n,m)`.
fn declared_length(type_name: &str) -> Option<i64> {
    let start = type_name.find('(')?;
    type_name[start + 1..]
        .split([',', ')'])
        .next()
        .and_then(|n| n.trim().parse().ok())
}

/// Default value from the SQL text `PRAGMA table_info` reports.
fn parse_default(raw: &str) -> RowValues {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("NULL") {
        return RowValues::Null;
    }
    if let Some(text) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        return RowValues::Text(text.replace("''", "'"));
    }
    if let Ok(i) = raw.parse::<i64>() {
        return RowValues::Int(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return RowValues::Float(f);
    }
    RowValues::Text(raw.to_string())
}

impl Driver for SqliteDriver {
    fn family(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn connect(&mut self, config: &ConnectionConfig) -> Result<(), DmlError> {
        let in_memory = config.dbname.is_empty() || config.dbname == ":memory:";
        let opened = if in_memory {
            Connection::open_in_memory()
        } else {
            Connection::open(&config.dbname)
        };
        let conn = opened.map_err(|e| {
            DmlError::ConnectionError(format!(
                "cannot open sqlite database '{}': {e}",
                config.dbname
            ))
        })?;

        if let Some(mode) = config.options.extra("journal_mode").and_then(JsonValue::as_str) {
            if !mode.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(DmlError::ConnectionError(format!(
                    "invalid journal_mode '{mode}'"
                )));
            }
            conn.execute_batch(&format!("PRAGMA journal_mode = {mode};"))
                .map_err(|e| DmlError::ConnectionError(format!("journal_mode: {e}")))?;
        }
        if let Some(ms) = config
            .options
            .extra("busy_timeout_ms")
            .and_then(JsonValue::as_u64)
        {
            conn.busy_timeout(Duration::from_millis(ms))
                .map_err(|e| DmlError::ConnectionError(format!("busy_timeout: {e}")))?;
        }

        self.conn = Some(conn);
        self.last_error = None;
        Ok(())
    }

    fn dispose(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                tracing::warn!("sqlite close failed: {e}");
            }
        }
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }

    fn allowed_param_types(&self) -> ParamStyles {
        ParamStyles::POSITIONAL
    }

    fn execute(&mut self, query: &NormalizedQuery) -> Result<usize, DmlError> {
        let params = Params::convert(&query.values());
        self.run(|conn| {
            let mut stmt = conn.prepare(&query.sql)?;
            Ok(stmt.execute(&params.as_refs()[..])?)
        })
    }

    fn query(&mut self, query: &NormalizedQuery) -> Result<Box<dyn Cursor>, DmlError> {
        let params = Params::convert(&query.values());
        self.run(|conn| {
            let mut stmt = conn.prepare(&query.sql)?;
            let records = build_records(&mut stmt, &params.0)?;
            Ok(Box::new(BufferedCursor::new(records)) as Box<dyn Cursor>)
        })
    }

    fn last_insert_id(&mut self, _table: &str) -> Result<Option<i64>, DmlError> {
        self.run(|conn| Ok(Some(conn.last_insert_rowid())))
    }

    fn get_tables(&mut self, prefix: &str) -> Result<Vec<String>, DmlError> {
        self.run(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master
                  WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'
                    AND substr(name, 1, length(?1)) = ?1
               ORDER BY name",
            )?;
            let names = stmt
                .query_map([prefix], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(names
                .into_iter()
                .map(|name| name.strip_prefix(prefix).unwrap_or(&name).to_string())
                .collect())
        })
    }

    fn get_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, DmlError> {
        self.run(|conn| {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(table)))?;
            let columns = stmt
                .query_map([], |row| {
                    let name: String = row.get(1)?;
                    let type_name: String = row.get(2)?;
                    let not_null: i64 = row.get(3)?;
                    let default: Option<String> = row.get(4)?;
                    let pk: i64 = row.get(5)?;
                    let meta_type = meta_type(&type_name);
                    Ok(ColumnInfo {
                        max_length: declared_length(&type_name),
                        auto_increment: pk > 0 && type_name.eq_ignore_ascii_case("INTEGER"),
                        primary_key: pk > 0,
                        not_null: not_null != 0,
                        has_default: default.is_some(),
                        default_value: default.as_deref().map(parse_default),
                        meta_type,
                        type_name,
                        name,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(columns)
        })
    }

    fn get_indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>, DmlError> {
        self.run(|conn| {
            let mut list = conn.prepare(&format!("PRAGMA index_list({})", quote(table)))?;
            let indexes = list
                .query_map([], |row| {
                    Ok((row.get::<_, String>(1)?, row.get::<_, i64>(2)? != 0))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut out = Vec::with_capacity(indexes.len());
            for (name, unique) in indexes {
                if name.starts_with("sqlite_autoindex") {
                    continue;
                }
                let mut info = conn.prepare(&format!("PRAGMA index_info({})", quote(&name)))?;
                let columns = info
                    .query_map([], |row| row.get::<_, String>(2))?
                    .collect::<Result<Vec<_>, _>>()?;
                out.push(IndexInfo {
                    name,
                    unique,
                    columns,
                });
            }
            out.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(out)
        })
    }

    fn server_info(&self) -> ServerInfo {
        ServerInfo {
            description: "SQLite".to_string(),
            version: rusqlite::version().to_string(),
        }
    }
}

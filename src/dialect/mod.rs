//! SQL fragment generation per database family.
//!
//! Every method returns text only; nothing here executes SQL. The trait's default
//! bodies are portable SQL and each family overrides only what its engine spells
//! differently.

mod mssql;
mod mysql;
mod postgres;
mod sqlite;

pub use mssql::MssqlDialect;
pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::types::DatabaseType;

/// Options for [`Dialect::like`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeOptions {
    pub case_sensitive: bool,
    pub accent_sensitive: bool,
    pub negate: bool,
    pub escape: char,
}

impl Default for LikeOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            accent_sensitive: true,
            negate: false,
            escape: '\\',
        }
    }
}

impl LikeOptions {
    #[must_use]
    pub fn case_insensitive() -> Self {
        Self {
            case_sensitive: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }
}

/// Dialect-specific SQL snippets.
pub trait Dialect: Send + Sync {
    fn family(&self) -> DatabaseType;

    fn bitand(&self, a: &str, b: &str) -> String {
        format!("(({a}) & ({b}))")
    }

    fn bitor(&self, a: &str, b: &str) -> String {
        format!("(({a}) | ({b}))")
    }

    /// XOR spelled with AND/OR for engines lacking an operator.
    fn bitxor(&self, a: &str, b: &str) -> String {
        format!("((({a}) | ({b})) - (({a}) & ({b})))")
    }

    fn bitnot(&self, a: &str) -> String {
        format!("(~({a}))")
    }

    fn modulo(&self, a: &str, b: &str) -> String {
        format!("(({a}) % ({b}))")
    }

    fn ceil(&self, field: &str) -> String {
        format!("CEIL({field})")
    }

    /// Cast a char column to integer. `text` marks a large text column.
    fn cast_char2int(&self, field: &str, _text: bool) -> String {
        format!(" {field} ")
    }

    fn cast_char2real(&self, field: &str, _text: bool) -> String {
        format!(" {field} ")
    }

    /// Treat an unsigned expression as signed.
    fn cast_2signed(&self, field: &str) -> String {
        format!(" {field} ")
    }

    /// Expression usable in `ORDER BY` for a text column.
    fn order_by_text(&self, field: &str, _numchars: usize) -> String {
        field.to_string()
    }

    /// Expression usable in `WHERE ... =` for a text column.
    fn compare_text(&self, field: &str, numchars: usize) -> String {
        self.order_by_text(field, numchars)
    }

    fn equal(&self, field: &str, param: &str, case_sensitive: bool, not_equal: bool) -> String {
        let op = if not_equal { "<>" } else { "=" };
        if case_sensitive {
            format!("{field} {op} {param}")
        } else {
            format!("LOWER({field}) {op} LOWER({param})")
        }
    }

    /// `LIKE` test. The portable form ignores case and accent options.
    fn like(&self, field: &str, param: &str, opts: LikeOptions) -> String {
        let op = if opts.negate { "NOT LIKE" } else { "LIKE" };
        format!("{field} {op} {param} ESCAPE '{}'", opts.escape)
    }

    /// Escape `%`, `_` and the escape character itself in a user-supplied LIKE term.
    fn like_escape(&self, text: &str, escape: char) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            if c == escape || c == '%' || c == '_' {
                out.push(escape);
            }
            out.push(c);
        }
        out
    }

    /// Case-insensitive LIKE operator text.
    fn ilike(&self) -> &'static str {
        "LIKE"
    }

    fn concat(&self, elements: &[&str]) -> String {
        if elements.is_empty() {
            return " '' ".to_string();
        }
        format!(" '' || {} ", elements.join(" || "))
    }

    fn concat_join(&self, separator: &str, elements: &[&str]) -> String {
        let mut spliced: Vec<&str> = Vec::with_capacity(elements.len() * 2);
        for (i, element) in elements.iter().copied().enumerate() {
            if i > 0 {
                spliced.push(separator);
            }
            spliced.push(element);
        }
        self.concat(&spliced)
    }

    fn fullname(&self, first: &str, last: &str) -> String {
        self.concat(&[first, "' '", last])
    }

    fn substr(&self, expr: &str, start: &str, length: Option<&str>) -> String {
        match length {
            Some(len) => format!("SUBSTR({expr}, {start}, {len})"),
            None => format!("SUBSTR({expr}, {start})"),
        }
    }

    fn length(&self, field: &str) -> String {
        format!("LENGTH({field})")
    }

    /// 1-based position of `needle` in `haystack`, 0 when absent.
    fn position(&self, needle: &str, haystack: &str) -> String {
        format!("POSITION(({needle}) IN ({haystack}))")
    }

    /// Test for an empty value. Nullable columns treat NULL as distinct from empty.
    fn isempty(&self, field: &str, _nullable: bool, _textfield: bool) -> String {
        format!(" ({field} = '') ")
    }

    fn isnotempty(&self, field: &str, _nullable: bool, _textfield: bool) -> String {
        format!(" ({field} <> '') ")
    }

    fn regex_supported(&self) -> bool {
        false
    }

    /// Regex-match operator, `None` when the engine has no usable operator.
    fn regex(&self, _positive: bool, _case_sensitive: bool) -> Option<&'static str> {
        None
    }

    fn group_concat(&self, field: &str, separator: &str, _sort: Option<&str>) -> String {
        format!("GROUP_CONCAT({field}, '{separator}')")
    }

    /// Suffix needed to select constants without a table.
    fn null_from_clause(&self) -> &'static str {
        ""
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Paging suffix appended after `ORDER BY`. Zero means "no limit" / "no offset".
    fn limit_clause(&self, offset: usize, limit: usize) -> String {
        match (offset, limit) {
            (0, 0) => String::new(),
            (0, l) => format!(" LIMIT {l}"),
            (o, 0) => format!(" OFFSET {o}"),
            (o, l) => format!(" LIMIT {l} OFFSET {o}"),
        }
    }

    /// True when the paging suffix is only valid after an `ORDER BY`.
    fn paging_needs_order(&self) -> bool {
        false
    }

    fn truncate_sql(&self, table: &str) -> String {
        format!("TRUNCATE TABLE {table}")
    }

    fn begin_sql(&self) -> &'static str {
        "BEGIN"
    }

    fn commit_sql(&self) -> &'static str {
        "COMMIT"
    }

    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK"
    }

    /// True when `INSERT ... RETURNING id` yields the generated key.
    fn supports_returning(&self) -> bool {
        false
    }
}

/// Fragment generator for a family.
#[must_use]
pub fn dialect_for(db_type: DatabaseType) -> &'static dyn Dialect {
    match db_type {
        DatabaseType::Sqlite => &SqliteDialect,
        DatabaseType::Postgres => &PostgresDialect,
        DatabaseType::Mysql => &MysqlDialect,
        DatabaseType::Mssql => &MssqlDialect,
    }
}

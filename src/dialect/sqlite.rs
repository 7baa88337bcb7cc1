use super::{Dialect, LikeOptions};
use crate::types::DatabaseType;

/// `SQLite` 3.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn family(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    // No CEIL before 3.35.
    fn ceil(&self, field: &str) -> String {
        format!("(CAST({field} AS INTEGER) + ({field} > CAST({field} AS INTEGER)))")
    }

    fn cast_char2int(&self, field: &str, _text: bool) -> String {
        format!(" CAST({field} AS INTEGER) ")
    }

    fn cast_char2real(&self, field: &str, _text: bool) -> String {
        format!(" CAST({field} AS REAL) ")
    }

    fn like(&self, field: &str, param: &str, opts: LikeOptions) -> String {
        let op = if opts.negate { "NOT LIKE" } else { "LIKE" };
        if opts.case_sensitive {
            format!("{field} {op} {param} ESCAPE '{}'", opts.escape)
        } else {
            format!("LOWER({field}) {op} LOWER({param}) ESCAPE '{}'", opts.escape)
        }
    }

    fn position(&self, needle: &str, haystack: &str) -> String {
        format!("INSTR({haystack}, {needle})")
    }

    fn limit_clause(&self, offset: usize, limit: usize) -> String {
        match (offset, limit) {
            (0, 0) => String::new(),
            (0, l) => format!(" LIMIT {l}"),
            (o, 0) => format!(" LIMIT -1 OFFSET {o}"),
            (o, l) => format!(" LIMIT {l} OFFSET {o}"),
        }
    }

    // DELETE without WHERE hits SQLite's truncate optimization.
    fn truncate_sql(&self, table: &str) -> String {
        format!("DELETE FROM {table}")
    }
}

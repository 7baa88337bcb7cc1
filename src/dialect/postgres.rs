use super::{Dialect, LikeOptions};
use crate::types::DatabaseType;

/// `PostgreSQL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn family(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn bitxor(&self, a: &str, b: &str) -> String {
        format!("(({a}) # ({b}))")
    }

    fn cast_char2int(&self, field: &str, _text: bool) -> String {
        format!(" CAST({field} AS INT) ")
    }

    fn cast_char2real(&self, field: &str, _text: bool) -> String {
        format!(" {field}::real ")
    }

    // Accent-insensitive matching is not available.
    fn like(&self, field: &str, param: &str, opts: LikeOptions) -> String {
        let op = match (opts.case_sensitive, opts.negate) {
            (true, false) => "LIKE",
            (true, true) => "NOT LIKE",
            (false, false) => "ILIKE",
            (false, true) => "NOT ILIKE",
        };
        format!("{field} {op} {param} ESCAPE '{}'", opts.escape)
    }

    fn ilike(&self) -> &'static str {
        "ILIKE"
    }

    fn concat_join(&self, separator: &str, elements: &[&str]) -> String {
        let joiner = format!(" || {separator} || ");
        format!(" {} ", elements.join(&joiner))
    }

    fn regex_supported(&self) -> bool {
        true
    }

    fn regex(&self, positive: bool, case_sensitive: bool) -> Option<&'static str> {
        Some(match (positive, case_sensitive) {
            (true, true) => "~",
            (true, false) => "~*",
            (false, true) => "!~",
            (false, false) => "!~*",
        })
    }

    fn group_concat(&self, field: &str, separator: &str, sort: Option<&str>) -> String {
        match sort {
            Some(sort) => {
                format!("STRING_AGG(CAST({field} AS VARCHAR), '{separator}' ORDER BY {sort})")
            }
            None => format!("STRING_AGG(CAST({field} AS VARCHAR), '{separator}')"),
        }
    }

    fn begin_sql(&self) -> &'static str {
        "BEGIN ISOLATION LEVEL READ COMMITTED"
    }

    fn supports_returning(&self) -> bool {
        true
    }
}

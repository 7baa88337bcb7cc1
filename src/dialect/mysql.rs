use super::{Dialect, LikeOptions};
use crate::types::DatabaseType;

/// `MySQL` and `MariaDB` with utf8mb4 collations.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn family(&self) -> DatabaseType {
        DatabaseType::Mysql
    }

    fn bitxor(&self, a: &str, b: &str) -> String {
        format!("(({a}) ^ ({b}))")
    }

    fn cast_char2int(&self, field: &str, _text: bool) -> String {
        format!(" CAST({field} AS SIGNED) ")
    }

    fn cast_char2real(&self, field: &str, _text: bool) -> String {
        format!(" {field}+0.0 ")
    }

    fn cast_2signed(&self, field: &str) -> String {
        format!(" CAST({field} AS SIGNED) ")
    }

    fn like(&self, field: &str, param: &str, opts: LikeOptions) -> String {
        let op = if opts.negate { "NOT LIKE" } else { "LIKE" };
        // Backslash is an escape inside MySQL string literals.
        let escape = if opts.escape == '\\' {
            "\\\\".to_string()
        } else {
            opts.escape.to_string()
        };
        if opts.case_sensitive {
            format!("{field} {op} {param} COLLATE utf8mb4_bin ESCAPE '{escape}'")
        } else if opts.accent_sensitive {
            format!("LOWER({field}) {op} LOWER({param}) COLLATE utf8mb4_bin ESCAPE '{escape}'")
        } else {
            format!("{field} {op} {param} ESCAPE '{escape}'")
        }
    }

    fn concat(&self, elements: &[&str]) -> String {
        format!("CONCAT({})", elements.join(", "))
    }

    fn concat_join(&self, separator: &str, elements: &[&str]) -> String {
        format!("CONCAT_WS({separator}, {})", elements.join(", "))
    }

    fn position(&self, needle: &str, haystack: &str) -> String {
        format!("LOCATE({needle}, {haystack})")
    }

    fn regex_supported(&self) -> bool {
        true
    }

    fn regex(&self, positive: bool, case_sensitive: bool) -> Option<&'static str> {
        Some(match (positive, case_sensitive) {
            (true, true) => "REGEXP BINARY",
            (true, false) => "REGEXP",
            (false, true) => "NOT REGEXP BINARY",
            (false, false) => "NOT REGEXP",
        })
    }

    fn group_concat(&self, field: &str, separator: &str, sort: Option<&str>) -> String {
        match sort {
            Some(sort) => format!("GROUP_CONCAT({field} ORDER BY {sort} SEPARATOR '{separator}')"),
            None => format!("GROUP_CONCAT({field} SEPARATOR '{separator}')"),
        }
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn limit_clause(&self, offset: usize, limit: usize) -> String {
        match (offset, limit) {
            (0, 0) => String::new(),
            (0, l) => format!(" LIMIT {l}"),
            (o, 0) => format!(" LIMIT {o}, 18446744073709551615"),
            (o, l) => format!(" LIMIT {o}, {l}"),
        }
    }

    fn begin_sql(&self) -> &'static str {
        "START TRANSACTION"
    }
}

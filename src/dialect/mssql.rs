use super::{Dialect, LikeOptions};
use crate::types::DatabaseType;

/// Microsoft SQL Server (2012+ for OFFSET/FETCH paging).
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlDialect;

impl MssqlDialect {
    fn collation(case_sensitive: bool, accent_sensitive: bool) -> String {
        format!(
            "Latin1_General_{}_{}",
            if case_sensitive { "CS" } else { "CI" },
            if accent_sensitive { "AS" } else { "AI" }
        )
    }

    fn cast_to_char(field: &str) -> String {
        format!("CAST({field} AS NVARCHAR(MAX))")
    }
}

impl Dialect for MssqlDialect {
    fn family(&self) -> DatabaseType {
        DatabaseType::Mssql
    }

    fn bitxor(&self, a: &str, b: &str) -> String {
        format!("(({a}) ^ ({b}))")
    }

    fn ceil(&self, field: &str) -> String {
        format!("CEILING({field})")
    }

    fn cast_char2int(&self, field: &str, text: bool) -> String {
        if text {
            format!(" CAST({} AS INT) ", Self::cast_to_char(field))
        } else {
            format!(" CAST({field} AS INT) ")
        }
    }

    fn cast_char2real(&self, field: &str, text: bool) -> String {
        if text {
            format!(" CAST({} AS REAL) ", Self::cast_to_char(field))
        } else {
            format!(" CAST({field} AS REAL) ")
        }
    }

    fn order_by_text(&self, field: &str, numchars: usize) -> String {
        format!(" CONVERT(varchar({numchars}), {field})")
    }

    fn like(&self, field: &str, param: &str, opts: LikeOptions) -> String {
        let op = if opts.negate { "NOT LIKE" } else { "LIKE" };
        let collation = Self::collation(opts.case_sensitive, opts.accent_sensitive);
        format!("{field} {op} {param} COLLATE {collation} ESCAPE '{}'", opts.escape)
    }

    fn concat(&self, elements: &[&str]) -> String {
        if elements.is_empty() {
            return " '' ".to_string();
        }
        let cast: Vec<String> = elements.iter().map(|e| Self::cast_to_char(e)).collect();
        format!(" {} ", cast.join(" + "))
    }

    fn substr(&self, expr: &str, start: &str, length: Option<&str>) -> String {
        let length = length.unwrap_or("2147483647");
        format!("SUBSTRING({expr}, {start}, {length})")
    }

    fn length(&self, field: &str) -> String {
        format!("LEN({field})")
    }

    fn position(&self, needle: &str, haystack: &str) -> String {
        format!("CHARINDEX(({needle}), ({haystack}))")
    }

    fn isempty(&self, field: &str, _nullable: bool, textfield: bool) -> String {
        if textfield {
            format!(" ({} = '') ", self.compare_text(field, 32))
        } else {
            format!(" ({field} = '') ")
        }
    }

    fn isnotempty(&self, field: &str, _nullable: bool, textfield: bool) -> String {
        if textfield {
            format!(" ({} <> '') ", self.compare_text(field, 32))
        } else {
            format!(" ({field} <> '') ")
        }
    }

    fn group_concat(&self, field: &str, separator: &str, sort: Option<&str>) -> String {
        let agg = format!("STRING_AGG({}, '{separator}')", Self::cast_to_char(field));
        match sort {
            Some(sort) => format!("{agg} WITHIN GROUP (ORDER BY {sort})"),
            None => agg,
        }
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    // OFFSET/FETCH requires an ORDER BY in the statement.
    fn limit_clause(&self, offset: usize, limit: usize) -> String {
        match (offset, limit) {
            (0, 0) => String::new(),
            (o, 0) => format!(" OFFSET {o} ROWS"),
            (o, l) => format!(" OFFSET {o} ROWS FETCH NEXT {l} ROWS ONLY"),
        }
    }

    fn paging_needs_order(&self) -> bool {
        true
    }

    fn begin_sql(&self) -> &'static str {
        "BEGIN TRANSACTION"
    }

    fn commit_sql(&self) -> &'static str {
        "COMMIT TRANSACTION"
    }

    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK TRANSACTION"
    }
}

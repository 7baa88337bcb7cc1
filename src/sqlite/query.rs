use std::sync::Arc;

use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::DmlError;
use crate::results::{Record, column_index};
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
/// Returns `DmlError::SqliteError` if the value cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row, idx: usize) -> Result<RowValues, DmlError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Run a prepared statement and collect its rows.
///
/// # Errors
/// Returns `DmlError::SqliteError` if execution or row extraction fails.
pub fn build_records(
    stmt: &mut Statement,
    params: &[Value],
) -> Result<Vec<Record>, DmlError> {
    let param_refs: Vec<&dyn rusqlite::ToSql> =
        params.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();

    // Column names and their index are shared by every row of the result.
    let cache = Arc::new(column_index(&column_names));
    let column_names = Arc::new(column_names);

    let mut rows_iter = stmt.query(&param_refs[..])?;
    let mut records = Vec::new();
    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value(row, i)?);
        }
        records.push(Record::with_cache(
            Arc::clone(&column_names),
            row_values,
            Arc::clone(&cache),
        ));
    }
    Ok(records)
}

use lazy_static::lazy_static;
use regex::Regex;

use super::Database;
use crate::clause::{where_clause, where_clause_list};
use crate::driver::ColumnInfo;
use crate::error::DmlError;
use crate::field_map::FieldMap;
use crate::results::DeleteOutcome;
use crate::translation::{contains_multiple_statements, normalize_params};
use crate::types::{ParamStyle, ParamStyles, Params, QueryType, RowValues};

lazy_static! {
    static ref STRUCTURE_CHANGE: Regex =
        Regex::new(r"(?i)^\s*(CREATE|ALTER|DROP|RENAME)\b").expect("valid ddl regex");
}

/// Coerce a value for storage in `column`.
fn normalise_value(column: &ColumnInfo, value: RowValues) -> RowValues {
    match value {
        RowValues::Bool(b) => RowValues::Int(i64::from(b)),
        RowValues::Text(s) if column.meta_type.is_numeric() && s.trim().is_empty() => {
            RowValues::Int(0)
        }
        other => other,
    }
}

/// Keep the fields `columns` knows about, coerced to their column types.
fn clean_fields(columns: &[ColumnInfo], data: &FieldMap, keep_id: bool) -> FieldMap {
    data.iter()
        .filter(|(field, _)| keep_id || *field != "id")
        .filter_map(|(field, value)| {
            let column = columns.iter().find(|c| c.name == field)?;
            Some((field, normalise_value(column, value.clone())))
        })
        .collect()
}

impl Database {
    fn run_write(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
        qtype: QueryType,
    ) -> Result<usize, DmlError> {
        let query = self.prepare(sql, params)?;
        self.query_start(&query.sql, &query.params, qtype);
        let result = self.driver.execute(&query);
        self.query_end(result)
    }

    fn table_columns(&mut self, table: &str) -> Result<std::sync::Arc<Vec<ColumnInfo>>, DmlError> {
        let columns = self.get_columns(table)?;
        if columns.is_empty() {
            return Err(DmlError::InvalidUsage(format!(
                "table '{table}' does not exist"
            )));
        }
        Ok(columns)
    }

    /// Insert `fields` as given, without consulting column metadata.
    ///
    /// Any `id` is dropped unless `custom_sequence` is set, in which case it is required
    /// and no generated id is returned.
    ///
    /// # Errors
    /// Returns `DmlError::InvalidUsage` for an empty field set or a custom-sequence
    /// insert without `id`, `DmlError::WriteError` when the engine fails.
    pub fn insert_record_raw(
        &mut self,
        table: &str,
        mut fields: FieldMap,
        return_id: bool,
        custom_sequence: bool,
    ) -> Result<Option<i64>, DmlError> {
        let return_id = if custom_sequence {
            if !fields.contains_key("id") {
                return Err(DmlError::InvalidUsage(
                    "an id field is required for a custom sequence insert".to_string(),
                ));
            }
            false
        } else {
            fields.remove("id");
            return_id
        };
        if fields.is_empty() {
            return Err(DmlError::InvalidUsage(format!(
                "no fields to insert into '{table}'"
            )));
        }

        let columns: Vec<&str> = fields.keys().collect();
        let markers = vec!["?"; columns.len()].join(",");
        let mut sql = format!(
            "INSERT INTO {{{table}}} ({}) VALUES({markers})",
            columns.join(",")
        );
        let values: Vec<RowValues> = fields.into_iter().map(|(_, v)| v).collect();

        let returning = return_id && self.dialect().supports_returning();
        if returning {
            sql.push_str(" RETURNING id");
            let query = self.prepare(&sql, values)?;
            self.query_start(&query.sql, &query.params, QueryType::Insert);
            let result = self.driver.query(&query).map(|mut cursor| {
                let id = cursor
                    .current()
                    .and_then(|record| record.first_value())
                    .and_then(RowValues::to_i64);
                cursor.close();
                id
            });
            return self.query_end(result);
        }

        self.run_write(&sql, values, QueryType::Insert)?;
        if !return_id {
            return Ok(None);
        }
        let physical = self.physical_name(table);
        self.driver.last_insert_id(&physical)
    }

    /// Insert a data object, dropping `id` and fields the table does not have.
    ///
    /// # Errors
    /// Returns `DmlError::InvalidUsage` if the table does not exist or no known field
    /// remains; `DmlError::WriteError` when the engine fails.
    pub fn insert_record(
        &mut self,
        table: &str,
        data: &FieldMap,
        return_id: bool,
    ) -> Result<Option<i64>, DmlError> {
        let columns = self.table_columns(table)?;
        let cleaned = clean_fields(&columns, data, false);
        self.insert_record_raw(table, cleaned, return_id, false)
    }

    /// Insert several data objects that all carry the same fields.
    ///
    /// # Errors
    /// Returns `DmlError::InvalidUsage` when the objects disagree on their fields;
    /// otherwise see [`Database::insert_record`].
    pub fn insert_records(&mut self, table: &str, records: &[FieldMap]) -> Result<(), DmlError> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        let mut expected: Vec<&str> = first.keys().collect();
        expected.sort_unstable();
        for record in records {
            let mut keys: Vec<&str> = record.keys().collect();
            keys.sort_unstable();
            if keys != expected {
                return Err(DmlError::InvalidUsage(format!(
                    "all records inserted into '{table}' must have the same fields"
                )));
            }
        }
        for record in records {
            self.insert_record(table, record, false)?;
        }
        Ok(())
    }

    /// Insert a data object keeping its own `id`, e.g. when restoring a backup.
    ///
    /// # Errors
    /// See [`Database::insert_record_raw`] with a custom sequence.
    pub fn import_record(&mut self, table: &str, data: &FieldMap) -> Result<(), DmlError> {
        let columns = self.table_columns(table)?;
        let cleaned = clean_fields(&columns, data, true);
        self.insert_record_raw(table, cleaned, false, true)?;
        Ok(())
    }

    /// Update the row identified by `fields["id"]` with every other field.
    ///
    /// # Errors
    /// Returns `DmlError::InvalidUsage` without an `id` or with nothing to set;
    /// `DmlError::WriteError` when the engine fails.
    pub fn update_record_raw(&mut self, table: &str, mut fields: FieldMap) -> Result<(), DmlError> {
        let id = fields
            .remove("id")
            .filter(|id| !id.is_null())
            .ok_or_else(|| DmlError::InvalidUsage(format!("update of '{table}' needs an id")))?;
        if fields.is_empty() {
            return Err(DmlError::InvalidUsage(format!(
                "no fields to update in '{table}'"
            )));
        }

        let sets: Vec<String> = fields.keys().map(|k| format!("{k} = ?")).collect();
        let sql = format!("UPDATE {{{table}}} SET {} WHERE id = ?", sets.join(","));
        let mut values: Vec<RowValues> = fields.into_iter().map(|(_, v)| v).collect();
        values.push(id);
        self.run_write(&sql, values, QueryType::Update)?;
        Ok(())
    }

    /// Update a data object, ignoring fields the table does not have.
    ///
    /// # Errors
    /// See [`Database::update_record_raw`]; also `InvalidUsage` for an unknown table.
    pub fn update_record(&mut self, table: &str, data: &FieldMap) -> Result<(), DmlError> {
        let columns = self.table_columns(table)?;
        let cleaned = clean_fields(&columns, data, true);
        self.update_record_raw(table, cleaned)
    }

    /// Set one column on every row matching `conditions`.
    ///
    /// # Errors
    /// See [`Database::set_field_select`].
    pub fn set_field(
        &mut self,
        table: &str,
        new_field: &str,
        new_value: impl Into<RowValues>,
        conditions: &FieldMap,
    ) -> Result<usize, DmlError> {
        let (select, params) = where_clause(conditions, ParamStyle::Positional)?;
        self.set_field_select(table, new_field, new_value, &select, params)
    }

    /// Set one column on every row matching `select`. A NULL value is written as
    /// `= NULL` rather than bound.
    ///
    /// # Errors
    /// Returns `DmlError::ParameterError` for malformed parameters and
    /// `DmlError::WriteError` when the engine fails.
    pub fn set_field_select(
        &mut self,
        table: &str,
        new_field: &str,
        new_value: impl Into<RowValues>,
        select: &str,
        params: impl Into<Params>,
    ) -> Result<usize, DmlError> {
        let scoped = normalize_params(select, params.into(), ParamStyles::POSITIONAL)?;
        let filter = if scoped.sql.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", scoped.sql)
        };

        let new_value = new_value.into();
        let mut values = scoped.values();
        let sql = if new_value.is_null() {
            format!("UPDATE {{{table}}} SET {new_field} = NULL{filter}")
        } else {
            values.insert(0, new_value);
            format!("UPDATE {{{table}}} SET {new_field} = ?{filter}")
        };
        self.run_write(&sql, values, QueryType::Update)
    }

    /// Delete rows matching `conditions`.
    ///
    /// `None` empties the whole table: outside a transaction with the dialect's
    /// truncate statement, inside one with an unconditional `DELETE` so the removal can
    /// still be rolled back. An empty map matches every row, as it does for reads, and
    /// removes them with a counted `DELETE`.
    ///
    /// # Errors
    /// Returns `DmlError::InvalidUsage` for numeric condition keys and
    /// `DmlError::WriteError` when the engine fails.
    pub fn delete_records(
        &mut self,
        table: &str,
        conditions: Option<&FieldMap>,
    ) -> Result<DeleteOutcome, DmlError> {
        match conditions {
            None if !self.in_transaction => {
                let sql = self.dialect().truncate_sql(&format!("{{{table}}}"));
                self.run_write(&sql, Params::none(), QueryType::Update)?;
                Ok(DeleteOutcome::Truncated)
            }
            None => Ok(DeleteOutcome::Deleted(
                self.delete_records_select(table, "", Params::none())?,
            )),
            Some(conditions) => {
                let (select, params) = where_clause(conditions, ParamStyle::Positional)?;
                Ok(DeleteOutcome::Deleted(
                    self.delete_records_select(table, &select, params)?,
                ))
            }
        }
    }

    /// `DELETE` with a raw WHERE fragment; an empty fragment deletes every row.
    ///
    /// # Errors
    /// See [`Database::set_field_select`].
    pub fn delete_records_select(
        &mut self,
        table: &str,
        select: &str,
        params: impl Into<Params>,
    ) -> Result<usize, DmlError> {
        let mut sql = format!("DELETE FROM {{{table}}}");
        if !select.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(select);
        }
        self.run_write(&sql, params, QueryType::Update)
    }

    /// Delete rows whose `field` equals any of `values`; an empty list deletes nothing.
    ///
    /// # Errors
    /// See [`Database::set_field_select`].
    pub fn delete_records_list(
        &mut self,
        table: &str,
        field: &str,
        values: &[RowValues],
    ) -> Result<usize, DmlError> {
        let (select, params) = where_clause_list(field, values);
        self.delete_records_select(table, &select, params)
    }

    /// Run one arbitrary statement that returns no rows.
    ///
    /// Schema changes (`CREATE`, `ALTER`, `DROP`, `RENAME`) clear the metadata caches.
    ///
    /// # Errors
    /// Returns `DmlError::InvalidUsage` for strings holding several statements,
    /// `DmlError::ParameterError` for malformed parameters and `DmlError::WriteError`
    /// when the engine fails.
    pub fn execute(&mut self, sql: &str, params: impl Into<Params>) -> Result<usize, DmlError> {
        if contains_multiple_statements(sql) {
            return Err(DmlError::InvalidUsage(
                "execute() runs a single statement only".to_string(),
            ));
        }
        let affected = self.run_write(sql, params, QueryType::Update)?;
        if STRUCTURE_CHANGE.is_match(sql) {
            self.reset_caches();
        }
        Ok(affected)
    }
}

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use super::Database;
use crate::clause::{where_clause, where_clause_list};
use crate::error::DmlError;
use crate::field_map::FieldMap;
use crate::recordset::Recordset;
use crate::results::{Record, RecordLookup, RecordMap};
use crate::types::{ParamStyle, Params, QueryType, RowValues, Strictness};

lazy_static! {
    static ref ORDER_BY: Regex = Regex::new(r"(?i)\border\s+by\b").expect("valid order regex");
}

/// Projection, ordering and paging for the table-level read helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub fields: String,
    pub sort: String,
    pub offset: usize,
    /// Zero means no limit.
    pub limit: usize,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            fields: "*".to_string(),
            sort: String::new(),
            offset: 0,
            limit: 0,
        }
    }
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = fields.into();
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    #[must_use]
    pub fn page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    fn select_sql(&self, table: &str, select: &str) -> String {
        let mut sql = format!("SELECT {} FROM {{{table}}}", self.fields);
        if !select.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(select);
        }
        if !self.sort.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.sort);
        }
        sql
    }
}

/// Conditions map → `(where, params)`, positional.
fn conditions_clause(conditions: &FieldMap) -> Result<(String, Params), DmlError> {
    where_clause(conditions, ParamStyle::Positional)
}

impl Database {
    /// Run `sql` and return a lazy, closeable record set.
    ///
    /// `limit == 0` means no limit. Paging is appended after `sql` with trailing
    /// semicolons removed, so `sql` must not end in a `--` comment. Engines that page
    /// only ordered results get `ORDER BY (SELECT NULL)` when `sql` has no `ORDER BY`.
    ///
    /// # Errors
    /// Returns `DmlError::ParameterError` for malformed parameters and
    /// `DmlError::ReadError` when the engine fails.
    pub fn recordset_sql(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
        offset: usize,
        limit: usize,
    ) -> Result<Recordset, DmlError> {
        let mut query = self.prepare(sql, params)?;
        if offset > 0 || limit > 0 {
            let dialect = self.dialect();
            let end = query.sql.trim_end().trim_end_matches(';').trim_end().len();
            query.sql.truncate(end);
            if dialect.paging_needs_order() && !ORDER_BY.is_match(&query.sql) {
                query.sql.push_str(" ORDER BY (SELECT NULL)");
            }
            query.sql.push_str(&dialect.limit_clause(offset, limit));
        }
        self.query_start(&query.sql, &query.params, QueryType::Select);
        let result = self.driver.query(&query);
        let cursor = self.query_end(result)?;
        Ok(Recordset::new(cursor))
    }

    /// # Errors
    /// See [`Database::recordset_sql`]; numeric condition keys are `InvalidUsage`.
    pub fn recordset(
        &mut self,
        table: &str,
        conditions: &FieldMap,
        selection: &Selection,
    ) -> Result<Recordset, DmlError> {
        let (select, params) = conditions_clause(conditions)?;
        self.recordset_select(table, &select, params, selection)
    }

    /// # Errors
    /// See [`Database::recordset_sql`].
    pub fn recordset_select(
        &mut self,
        table: &str,
        select: &str,
        params: impl Into<Params>,
        selection: &Selection,
    ) -> Result<Recordset, DmlError> {
        let sql = selection.select_sql(table, select);
        self.recordset_sql(&sql, params, selection.offset, selection.limit)
    }

    /// Rows whose `field` equals any of `values`; an empty list matches nothing.
    ///
    /// # Errors
    /// See [`Database::recordset_sql`].
    pub fn recordset_list(
        &mut self,
        table: &str,
        field: &str,
        values: &[RowValues],
        selection: &Selection,
    ) -> Result<Recordset, DmlError> {
        let (select, params) = where_clause_list(field, values);
        self.recordset_select(table, &select, params, selection)
    }

    /// Materialize every row, keyed by the first selected column.
    ///
    /// The first column should be unique; see [`RecordMap`] for what happens otherwise.
    ///
    /// # Errors
    /// See [`Database::recordset_sql`].
    pub fn records_sql(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
        offset: usize,
        limit: usize,
    ) -> Result<RecordMap, DmlError> {
        let recordset = self.recordset_sql(sql, params, offset, limit)?;
        let mut map = RecordMap::new();
        for record in recordset {
            map.insert(record?);
        }
        Ok(map)
    }

    /// # Errors
    /// See [`Database::records_sql`].
    pub fn records(
        &mut self,
        table: &str,
        conditions: &FieldMap,
        selection: &Selection,
    ) -> Result<RecordMap, DmlError> {
        let (select, params) = conditions_clause(conditions)?;
        self.records_select(table, &select, params, selection)
    }

    /// # Errors
    /// See [`Database::records_sql`].
    pub fn records_select(
        &mut self,
        table: &str,
        select: &str,
        params: impl Into<Params>,
        selection: &Selection,
    ) -> Result<RecordMap, DmlError> {
        let sql = selection.select_sql(table, select);
        self.records_sql(&sql, params, selection.offset, selection.limit)
    }

    /// # Errors
    /// See [`Database::records_sql`].
    pub fn records_list(
        &mut self,
        table: &str,
        field: &str,
        values: &[RowValues],
        selection: &Selection,
    ) -> Result<RecordMap, DmlError> {
        let (select, params) = where_clause_list(field, values);
        self.records_select(table, &select, params, selection)
    }

    /// First column → second column, in result order.
    ///
    /// # Errors
    /// Returns `DmlError::InvalidUsage` when fewer than two columns are selected.
    pub fn records_menu(
        &mut self,
        table: &str,
        conditions: &FieldMap,
        selection: &Selection,
    ) -> Result<Vec<(String, RowValues)>, DmlError> {
        let records = self.records(table, conditions, selection)?;
        menu(records)
    }

    /// # Errors
    /// See [`Database::records_menu`].
    pub fn records_sql_menu(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<(String, RowValues)>, DmlError> {
        let records = self.records_sql(sql, params, offset, limit)?;
        menu(records)
    }

    /// Classify how many rows `sql` matches, fetching at most two.
    ///
    /// # Errors
    /// See [`Database::recordset_sql`].
    pub fn lookup_record_sql(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<RecordLookup, DmlError> {
        let mut recordset = self.recordset_sql(sql, params, 0, 2)?;
        let first = recordset.next().transpose()?;
        let second = recordset.next().transpose()?;
        recordset.close();
        Ok(match (first, second) {
            (None, _) => RecordLookup::NotFound,
            (Some(record), None) => RecordLookup::Found(record),
            (Some(record), Some(_)) => RecordLookup::Multiple(record),
        })
    }

    /// A single row, subject to `strictness`.
    ///
    /// # Errors
    /// Under `Strictness::MustExist`, `MissingRecord` for zero rows and
    /// `MultipleRecords` for several; otherwise see [`Database::recordset_sql`].
    pub fn record_sql(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
        strictness: Strictness,
    ) -> Result<Option<Record>, DmlError> {
        let params = params.into();
        let lookup = if strictness == Strictness::IgnoreMultiple {
            let mut recordset = self.recordset_sql(sql, params.clone(), 0, 1)?;
            let first = recordset.next().transpose()?;
            recordset.close();
            first.map_or(RecordLookup::NotFound, RecordLookup::Found)
        } else {
            self.lookup_record_sql(sql, params.clone())?
        };

        match (lookup, strictness) {
            (RecordLookup::Found(record), _) => Ok(Some(record)),
            (RecordLookup::NotFound, Strictness::MustExist) => Err(DmlError::MissingRecord {
                sql: sql.to_string(),
                params: params.to_json().to_string(),
            }),
            (RecordLookup::NotFound, _) => Ok(None),
            (RecordLookup::Multiple(_), Strictness::MustExist) => {
                Err(DmlError::MultipleRecords {
                    sql: sql.to_string(),
                    params: params.to_json().to_string(),
                })
            }
            (RecordLookup::Multiple(record), _) => {
                warn!("found more than one record where only one was expected, using the first: {sql}");
                Ok(Some(record))
            }
        }
    }

    /// # Errors
    /// See [`Database::record_sql`].
    pub fn record_select(
        &mut self,
        table: &str,
        select: &str,
        params: impl Into<Params>,
        fields: &str,
        strictness: Strictness,
    ) -> Result<Option<Record>, DmlError> {
        let sql = Selection::new().fields(fields).select_sql(table, select);
        self.record_sql(&sql, params, strictness)
    }

    /// # Errors
    /// See [`Database::record_sql`].
    pub fn record(
        &mut self,
        table: &str,
        conditions: &FieldMap,
        fields: &str,
        strictness: Strictness,
    ) -> Result<Option<Record>, DmlError> {
        let (select, params) = conditions_clause(conditions)?;
        self.record_select(table, &select, params, fields, strictness)
    }

    /// One column of a single row.
    ///
    /// # Errors
    /// See [`Database::record_sql`].
    pub fn field(
        &mut self,
        table: &str,
        return_field: &str,
        conditions: &FieldMap,
        strictness: Strictness,
    ) -> Result<Option<RowValues>, DmlError> {
        let (select, params) = conditions_clause(conditions)?;
        self.field_select(table, return_field, &select, params, strictness)
    }

    /// # Errors
    /// See [`Database::record_sql`].
    pub fn field_select(
        &mut self,
        table: &str,
        return_field: &str,
        select: &str,
        params: impl Into<Params>,
        strictness: Strictness,
    ) -> Result<Option<RowValues>, DmlError> {
        let sql = Selection::new().fields(return_field).select_sql(table, select);
        self.field_sql(&sql, params, strictness)
    }

    /// First column of the single row `sql` returns.
    ///
    /// # Errors
    /// See [`Database::record_sql`].
    pub fn field_sql(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
        strictness: Strictness,
    ) -> Result<Option<RowValues>, DmlError> {
        Ok(self
            .record_sql(sql, params, strictness)?
            .and_then(|record| record.first_value().cloned()))
    }

    /// One column of every matching row.
    ///
    /// # Errors
    /// See [`Database::recordset_sql`].
    pub fn fieldset_select(
        &mut self,
        table: &str,
        return_field: &str,
        select: &str,
        params: impl Into<Params>,
    ) -> Result<Vec<RowValues>, DmlError> {
        let sql = Selection::new().fields(return_field).select_sql(table, select);
        self.fieldset_sql(&sql, params)
    }

    /// First column of every row, duplicates included.
    ///
    /// # Errors
    /// See [`Database::recordset_sql`].
    pub fn fieldset_sql(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<Vec<RowValues>, DmlError> {
        let recordset = self.recordset_sql(sql, params, 0, 0)?;
        recordset
            .map(|record| record.map(|r| r.first_value().cloned().unwrap_or(RowValues::Null)))
            .collect()
    }

    /// # Errors
    /// See [`Database::count_records_sql`].
    pub fn count_records(&mut self, table: &str, conditions: &FieldMap) -> Result<i64, DmlError> {
        let (select, params) = conditions_clause(conditions)?;
        self.count_records_select(table, &select, params, "COUNT('x')")
    }

    /// # Errors
    /// See [`Database::count_records_sql`].
    pub fn count_records_select(
        &mut self,
        table: &str,
        select: &str,
        params: impl Into<Params>,
        count_item: &str,
    ) -> Result<i64, DmlError> {
        let sql = Selection::new().fields(count_item).select_sql(table, select);
        self.count_records_sql(&sql, params)
    }

    /// The integer in the first column of the first row; 0 when there is no row or the
    /// value is NULL.
    ///
    /// # Errors
    /// Returns `DmlError::InvalidUsage` when the value is not a whole number; otherwise
    /// see [`Database::recordset_sql`].
    pub fn count_records_sql(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<i64, DmlError> {
        let value = self.field_sql(sql, params, Strictness::IgnoreMultiple)?;
        match value {
            None | Some(RowValues::Null) => Ok(0),
            Some(value) => value.to_i64().ok_or_else(|| {
                DmlError::InvalidUsage(format!("count query returned a non-integer: {sql}"))
            }),
        }
    }

    /// # Errors
    /// See [`Database::record_exists_sql`].
    pub fn record_exists(&mut self, table: &str, conditions: &FieldMap) -> Result<bool, DmlError> {
        let (select, params) = conditions_clause(conditions)?;
        self.record_exists_select(table, &select, params)
    }

    /// # Errors
    /// See [`Database::record_exists_sql`].
    pub fn record_exists_select(
        &mut self,
        table: &str,
        select: &str,
        params: impl Into<Params>,
    ) -> Result<bool, DmlError> {
        let sql = Selection::new().fields("'x'").select_sql(table, select);
        self.record_exists_sql(&sql, params)
    }

    /// True when `sql` yields at least one row. The record set is closed before
    /// returning.
    ///
    /// # Errors
    /// See [`Database::recordset_sql`].
    pub fn record_exists_sql(
        &mut self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<bool, DmlError> {
        let mut recordset = self.recordset_sql(sql, params, 0, 1)?;
        let exists = recordset.valid();
        recordset.close();
        Ok(exists)
    }
}

fn menu(records: RecordMap) -> Result<Vec<(String, RowValues)>, DmlError> {
    records
        .into_iter()
        .map(|record| {
            let key = record
                .first_value()
                .map(RowValues::to_key)
                .unwrap_or_default();
            let value = record.get_by_index(1).cloned().ok_or_else(|| {
                DmlError::InvalidUsage("menus need two selected columns".to_string())
            })?;
            Ok((key, value))
        })
        .collect()
}

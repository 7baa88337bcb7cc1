use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::DmlError;
use crate::field_map::FieldMap;
use crate::types::RowValues;

/// One row of a query result.
///
/// Column names are shared by every row of the same result, together with a
/// name → index cache.
#[derive(Debug, Clone)]
pub struct Record {
    /// The column names for this row (shared across all rows in a result)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row, in column order
    pub values: Vec<RowValues>,
    #[doc(hidden)]
    pub(crate) column_index_cache: Arc<HashMap<String, usize>>,
}

impl Record {
    /// Create a record, building its own column cache.
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        let cache = Arc::new(column_index(&column_names));
        Self {
            column_names,
            values,
            column_index_cache: cache,
        }
    }

    /// Create a record sharing a cache built by [`column_index`].
    #[must_use]
    pub fn with_cache(
        column_names: Arc<Vec<String>>,
        values: Vec<RowValues>,
        cache: Arc<HashMap<String, usize>>,
    ) -> Self {
        Self {
            column_names,
            values,
            column_index_cache: cache,
        }
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.column_index_cache.get(column_name) {
            return Some(idx);
        }
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    /// The first selected column, which keys [`crate::RecordMap`].
    #[must_use]
    pub fn first_value(&self) -> Option<&RowValues> {
        self.values.first()
    }

    /// Value of the `id` column as an integer.
    #[must_use]
    pub fn id(&self) -> Option<i64> {
        self.get("id").and_then(RowValues::to_i64)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy the record into a mutable field map, e.g. to modify and `update_record` it.
    #[must_use]
    pub fn to_field_map(&self) -> FieldMap {
        self.column_names
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }

    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let map: JsonMap<String, JsonValue> = self
            .column_names
            .iter()
            .zip(&self.values)
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        JsonValue::Object(map)
    }

    /// Deserialize the record into a struct whose fields match the column names.
    ///
    /// # Errors
    /// Returns `DmlError::InvalidUsage` when the columns do not fit `T`.
    pub fn hydrate<T: DeserializeOwned>(&self) -> Result<T, DmlError> {
        serde_json::from_value(self.to_json())
            .map_err(|e| DmlError::InvalidUsage(format!("cannot hydrate record: {e}")))
    }
}

/// Column name → position map shared between the rows of one result.
#[must_use]
pub fn column_index(column_names: &[String]) -> HashMap<String, usize> {
    column_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), i))
        .collect()
}

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::DmlError;
use crate::types::RowValues;

/// Ordered field name → value map.
///
/// Used both as a conditions map (entries are AND-combined equality tests) and as the
/// data object handed to inserts and updates.
/// ```rust
/// use dml_middleware::prelude::*;
///
/// let conditions = FieldMap::new().with("name", "Bolt").with("deleted", RowValues::Null);
/// assert_eq!(conditions.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, RowValues)>,
}

impl FieldMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.set(field, value);
        self
    }

    /// Insert or replace a field, keeping the position of an existing entry.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<RowValues>) {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&RowValues> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, field: &str) -> Option<RowValues> {
        let pos = self.entries.iter().position(|(name, _)| name == field)?;
        Some(self.entries.remove(pos).1)
    }

    #[must_use]
    pub fn contains_key(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Build a field map from any struct that serializes to a flat JSON object.
    ///
    /// # Errors
    /// Returns `DmlError::InvalidUsage` if `value` does not serialize to an object.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, DmlError> {
        match serde_json::to_value(value) {
            Ok(JsonValue::Object(map)) => Ok(map
                .iter()
                .map(|(k, v)| (k.clone(), RowValues::from_json(v)))
                .collect()),
            Ok(other) => Err(DmlError::InvalidUsage(format!(
                "expected a struct or map, got {other}"
            ))),
            Err(e) => Err(DmlError::InvalidUsage(format!("cannot serialize data object: {e}"))),
        }
    }
}

impl<K: Into<String>, V: Into<RowValues>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

impl<K: Into<String>, V: Into<RowValues>, const N: usize> From<[(K, V); N]> for FieldMap {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, RowValues);
    type IntoIter = std::vec::IntoIter<(String, RowValues)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

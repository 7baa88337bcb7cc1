use std::collections::HashMap;

use super::row::Record;
use crate::types::RowValues;

/// Materialized rows keyed by the value of their first column.
///
/// Callers are expected to select a unique first column (usually `id`). When two rows
/// share a key the later row replaces the earlier one in place: the key keeps its
/// first position and holds the last row. This is deterministic but lossy.
#[derive(Debug, Clone, Default)]
pub struct RecordMap {
    records: Vec<Record>,
    index: HashMap<String, usize>,
}

impl RecordMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, record: Record) {
        let key = record.first_value().map(RowValues::to_key).unwrap_or_default();
        if let Some(&pos) = self.index.get(&key) {
            self.records[pos] = record;
        } else {
            self.index.insert(key, self.records.len());
            self.records.push(record);
        }
    }

    /// Look up a row by first-column value.
    pub fn get(&self, key: impl Into<RowValues>) -> Option<&Record> {
        let key = key.into().to_key();
        self.index.get(&key).map(|&pos| &self.records[pos])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Keys in result order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.first_value().map(RowValues::to_key).unwrap_or_default())
            .collect()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl IntoIterator for RecordMap {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordMap {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

//! Result containers: single rows, keyed row maps and lookup outcomes.

mod record_map;
mod row;

pub use record_map::RecordMap;
pub use row::{Record, column_index};

/// Outcome of a single-record lookup, before any strictness policy is applied.
#[derive(Debug, Clone)]
pub enum RecordLookup {
    Found(Record),
    NotFound,
    /// Several rows matched; carries the first one.
    Multiple(Record),
}

impl RecordLookup {
    /// The row a lenient lookup would return.
    #[must_use]
    pub fn into_record(self) -> Option<Record> {
        match self {
            RecordLookup::Found(r) | RecordLookup::Multiple(r) => Some(r),
            RecordLookup::NotFound => None,
        }
    }
}

/// What a delete call actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The table was emptied with the dialect's truncate statement.
    Truncated,
    /// A `DELETE` ran (or was skipped) and removed this many rows.
    Deleted(usize),
}

//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::clause::{InOrEqual, InOrEqualBuilder, OnEmpty};
pub use crate::config::{ConnectionConfig, DbOptions};
pub use crate::database::{Database, Selection};
pub use crate::dialect::{Dialect, LikeOptions};
pub use crate::driver::{ColumnInfo, Driver, DriverRegistry, IndexInfo};
pub use crate::error::DmlError;
pub use crate::field_map::FieldMap;
pub use crate::recordset::{Cursor, Recordset};
pub use crate::results::{DeleteOutcome, Record, RecordLookup, RecordMap};
pub use crate::structure::{FieldKind, FieldSpec, TableSpec};
pub use crate::types::{
    DatabaseType, ParamStyle, ParamStyles, Params, QueryType, RowValues, Strictness,
};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteDriver;

//! Dialect-independent record access over pluggable SQL drivers.
//!
//! Application code talks to a [`Database`]: it asks for records, fields and counts,
//! inserts and updates data objects, and runs parameterized statements. The same calls
//! work on every engine because the crate
//!
//! * rewrites `:named`, `?` and `$1` placeholders into whatever the driver accepts
//!   ([`translation`]),
//! * builds WHERE fragments from condition maps and value lists ([`clause`]),
//! * spells engine-specific SQL through a [`Dialect`],
//! * brackets every statement with timing, counters and optional query logging
//!   ([`executor`]).
//!
//! Drivers implement the [`Driver`] trait and are looked up in a [`DriverRegistry`].
//! The `sqlite` feature (on by default) bundles a rusqlite driver.
//!
//! ```rust,no_run
//! use dml_middleware::prelude::*;
//!
//! # fn main() -> Result<(), DmlError> {
//! let mut db = Database::connect(ConnectionConfig::builder(DatabaseType::Sqlite).finish())?;
//! db.execute("CREATE TABLE {widgets} (id INTEGER PRIMARY KEY, name TEXT, visible INTEGER)", Params::none())?;
//! db.insert_record("widgets", &FieldMap::new().with("name", "Bolt").with("visible", true), false)?;
//! let n = db.count_records("widgets", &FieldMap::new().with("visible", 1))?;
//! assert_eq!(n, 1);
//! # Ok(())
//! # }
//! ```

pub mod clause;
pub mod config;
pub mod database;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod executor;
pub mod field_map;
pub mod prelude;
pub mod recordset;
pub mod results;
pub mod structure;
pub mod transaction;
pub mod translation;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use clause::{InOrEqual, InOrEqualBuilder, OnEmpty, where_clause, where_clause_list};
pub use config::{ConnectionConfig, ConnectionConfigBuilder, DbOptions};
pub use database::{Database, Selection, SessionFlush};
pub use dialect::{Dialect, LikeOptions, dialect_for};
pub use driver::{
    ColumnInfo, Driver, DriverFactory, DriverRegistry, IndexInfo, MetaType, ServerInfo,
};
pub use error::DmlError;
pub use executor::{QueryDescriptor, QueryLogEntry};
pub use field_map::FieldMap;
pub use recordset::{BufferedCursor, Cursor, Recordset};
pub use results::{DeleteOutcome, Record, RecordLookup, RecordMap};
pub use structure::{FieldKind, FieldSpec, SqlGenerator, StandardSqlGenerator, TableSpec};
pub use translation::{NormalizedQuery, normalize_params};
pub use types::{
    DatabaseType, ParamStyle, ParamStyles, Params, QueryType, RowValues, Strictness,
};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;

//! The contract every database engine implements, plus the registry that maps a
//! [`DatabaseType`] to a driver constructor.
//!
//! Drivers are raw: they run exactly the SQL they are given with parameters already
//! normalized to one of their [`allowed_param_types`](Driver::allowed_param_types).
//! Timing, counters, logging and error typing live in [`crate::Database`].

use std::collections::HashMap;
use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::dialect::Dialect;
use crate::error::DmlError;
use crate::recordset::Cursor;
use crate::translation::NormalizedQuery;
use crate::types::{DatabaseType, ParamStyles, RowValues};

/// Coarse column class used when coercing values before a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaType {
    /// Integer (`I`)
    Integer,
    /// Short character data (`C`)
    Char,
    /// Long text (`X`)
    Text,
    /// Fixed precision number (`N`)
    Number,
    /// Floating point (`F`)
    Float,
    /// Binary (`B`)
    Binary,
}

impl MetaType {
    /// One-letter code used in column dumps.
    #[must_use]
    pub fn code(self) -> char {
        match self {
            MetaType::Integer => 'I',
            MetaType::Char => 'C',
            MetaType::Text => 'X',
            MetaType::Number => 'N',
            MetaType::Float => 'F',
            MetaType::Binary => 'B',
        }
    }

    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, MetaType::Integer | MetaType::Number | MetaType::Float)
    }
}

/// One column as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    /// Engine type name, e.g. `VARCHAR(255)`.
    pub type_name: String,
    pub meta_type: MetaType,
    pub max_length: Option<i64>,
    pub not_null: bool,
    pub has_default: bool,
    pub default_value: Option<RowValues>,
    pub primary_key: bool,
    pub auto_increment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub description: String,
    pub version: String,
}

/// A database engine.
///
/// Table names passed to the metadata methods already carry the connection prefix.
pub trait Driver {
    fn family(&self) -> DatabaseType;

    /// Open the connection.
    ///
    /// # Errors
    /// Returns `DmlError::ConnectionError` when the engine cannot be reached.
    fn connect(&mut self, config: &ConnectionConfig) -> Result<(), DmlError>;

    /// Close the connection. Must be safe to call more than once.
    fn dispose(&mut self);

    /// Engine text for the most recent failure.
    fn last_error(&self) -> Option<String>;

    fn allowed_param_types(&self) -> ParamStyles;

    fn dialect(&self) -> &'static dyn Dialect {
        crate::dialect::dialect_for(self.family())
    }

    /// Run a statement that returns no rows; yields the affected row count.
    ///
    /// # Errors
    /// Returns `DmlError` carrying the engine failure.
    fn execute(&mut self, query: &NormalizedQuery) -> Result<usize, DmlError>;

    /// Run a statement and return a cursor over its rows.
    ///
    /// # Errors
    /// Returns `DmlError` carrying the engine failure.
    fn query(&mut self, query: &NormalizedQuery) -> Result<Box<dyn Cursor>, DmlError>;

    /// Key generated by the last insert into `table`.
    ///
    /// # Errors
    /// Returns `DmlError` if the engine cannot report it.
    fn last_insert_id(&mut self, table: &str) -> Result<Option<i64>, DmlError>;

    /// Tables whose name starts with `prefix`, returned without the prefix.
    ///
    /// # Errors
    /// Returns `DmlError` on engine failure.
    fn get_tables(&mut self, prefix: &str) -> Result<Vec<String>, DmlError>;

    /// Columns in table order; empty when the table does not exist.
    ///
    /// # Errors
    /// Returns `DmlError` on engine failure.
    fn get_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, DmlError>;

    /// # Errors
    /// Returns `DmlError` on engine failure.
    fn get_indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>, DmlError>;

    fn transactions_supported(&self) -> bool {
        true
    }

    fn session_lock_supported(&self) -> bool {
        false
    }

    /// Block until the lock for `rowid` is held or `timeout` passes.
    ///
    /// # Errors
    /// Returns `DmlError::Unimplemented` unless the engine supports session locks.
    fn acquire_session_lock(&mut self, rowid: i64, _timeout: Duration) -> Result<(), DmlError> {
        Err(DmlError::Unimplemented(format!(
            "session lock {rowid}: {} has no session locks",
            self.family()
        )))
    }

    /// # Errors
    /// Returns `DmlError::Unimplemented` unless the engine supports session locks.
    fn release_session_lock(&mut self, rowid: i64) -> Result<(), DmlError> {
        Err(DmlError::Unimplemented(format!(
            "session unlock {rowid}: {} has no session locks",
            self.family()
        )))
    }

    fn server_info(&self) -> ServerInfo;
}

/// Constructs an unconnected driver for a configuration.
pub type DriverFactory = fn(&ConnectionConfig) -> Result<Box<dyn Driver>, DmlError>;

/// Explicit `DatabaseType` → driver constructor map.
#[derive(Debug, Clone, Default)]
pub struct DriverRegistry {
    factories: HashMap<DatabaseType, DriverFactory>,
}

impl DriverRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the drivers compiled into this crate.
    #[must_use]
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "sqlite")]
        registry.register(DatabaseType::Sqlite, crate::sqlite::SqliteDriver::factory);
        registry
    }

    /// Add or replace the constructor for `db_type`.
    pub fn register(&mut self, db_type: DatabaseType, factory: DriverFactory) -> &mut Self {
        self.factories.insert(db_type, factory);
        self
    }

    #[must_use]
    pub fn supports(&self, db_type: DatabaseType) -> bool {
        self.factories.contains_key(&db_type)
    }

    /// Build an unconnected driver for `config.db_type`.
    ///
    /// # Errors
    /// Returns `DmlError::ConnectionError` if no driver is registered for the type, or
    /// the factory's own error.
    pub fn create(&self, config: &ConnectionConfig) -> Result<Box<dyn Driver>, DmlError> {
        let factory = self.factories.get(&config.db_type).ok_or_else(|| {
            DmlError::ConnectionError(format!("no driver registered for {}", config.db_type))
        })?;
        factory(config)
    }
}

//! The connection handle applications talk to.
//!
//! [`Database`] owns one driver and layers the record access API on top of it: reads in
//! `select.rs`, writes in `dml.rs`, statement bookkeeping in [`crate::executor`],
//! transactions and session locks in [`crate::transaction`], DDL in
//! [`crate::structure`].

mod dml;
mod select;

use std::collections::HashMap;
use std::sync::Arc;

use crate::clause::{InOrEqual, InOrEqualBuilder};
use crate::config::ConnectionConfig;
use crate::dialect::Dialect;
use crate::driver::{ColumnInfo, Driver, DriverRegistry, IndexInfo, ServerInfo};
use crate::error::DmlError;
use crate::executor::Instrumentation;
use crate::structure::SqlGenerator;
use crate::translation::{NormalizedQuery, fix_table_names, normalize_params};
use crate::types::{DatabaseType, Params, QueryType};

pub use select::Selection;

/// Hook run by [`Database::dispose`] when the connection stores sessions.
pub type SessionFlush = Box<dyn FnOnce(&mut Database) -> Result<(), DmlError>>;

/// One open connection plus its per-connection state.
///
/// A `Database` serves a single unit of work: it is not shared between threads and
/// keeps no global state. Dropping it disposes the driver.
///
/// ```rust,no_run
/// use dml_middleware::prelude::*;
///
/// # fn main() -> Result<(), DmlError> {
/// let config = ConnectionConfig::builder(DatabaseType::Sqlite).prefix("mdl_").finish();
/// let mut db = Database::connect(config)?;
/// let id = db.insert_record("widgets", &FieldMap::new().with("name", "Bolt"), true)?;
/// let widget = db.record(
///     "widgets",
///     &FieldMap::new().with("id", id),
///     "*",
///     Strictness::MustExist,
/// )?;
/// # let _ = widget;
/// # Ok(())
/// # }
/// ```
pub struct Database {
    pub(crate) driver: Box<dyn Driver>,
    pub(crate) config: ConnectionConfig,
    pub(crate) instr: Instrumentation,
    pub(crate) tables: Option<Vec<String>>,
    pub(crate) columns: HashMap<String, Arc<Vec<ColumnInfo>>>,
    pub(crate) in_transaction: bool,
    pub(crate) session_lock: Option<i64>,
    pub(crate) used_for_db_sessions: bool,
    pub(crate) session_flush: Option<SessionFlush>,
    pub(crate) generator: Option<Box<dyn SqlGenerator>>,
    pub(crate) in_or_equal_index: usize,
    pub(crate) disposed: bool,
}

impl Database {
    /// Connect using the drivers compiled into this crate.
    ///
    /// # Errors
    /// Returns `DmlError::ConnectionError` if no driver handles `config.db_type` or the
    /// engine refuses the connection.
    pub fn connect(config: ConnectionConfig) -> Result<Self, DmlError> {
        Self::connect_with(&DriverRegistry::with_defaults(), config)
    }

    /// Connect using an explicit driver registry.
    ///
    /// # Errors
    /// Returns `DmlError::ConnectionError` if the registry has no driver for the type or
    /// the engine refuses the connection.
    pub fn connect_with(
        registry: &DriverRegistry,
        config: ConnectionConfig,
    ) -> Result<Self, DmlError> {
        let driver = registry.create(&config)?;
        Self::with_driver(driver, config)
    }

    /// Connect an already constructed driver.
    ///
    /// # Errors
    /// Returns the driver's connection error.
    pub fn with_driver(
        mut driver: Box<dyn Driver>,
        config: ConnectionConfig,
    ) -> Result<Self, DmlError> {
        driver.connect(&config)?;
        Ok(Self {
            driver,
            instr: Instrumentation::new(config.options.debug),
            config,
            tables: None,
            columns: HashMap::new(),
            in_transaction: false,
            session_lock: None,
            used_for_db_sessions: false,
            session_flush: None,
            generator: None,
            in_or_equal_index: 1,
            disposed: false,
        })
    }

    /// Snapshot of the settings this connection was opened with.
    #[must_use]
    pub fn export_config(&self) -> ConnectionConfig {
        self.config.clone()
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    #[must_use]
    pub fn family(&self) -> DatabaseType {
        self.driver.family()
    }

    /// SQL fragment generator for this connection's engine.
    #[must_use]
    pub fn dialect(&self) -> &'static dyn Dialect {
        self.driver.dialect()
    }

    #[must_use]
    pub fn server_info(&self) -> ServerInfo {
        self.driver.server_info()
    }

    /// Echo every statement to the `dml_middleware::debug` tracing target.
    pub fn set_debug(&mut self, enabled: bool) {
        self.instr.debug = enabled;
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Tables of this connection's prefix, unprefixed. Cached until [`reset_caches`].
    ///
    /// # Errors
    /// Returns `DmlError::ReadError` if the engine cannot list tables.
    ///
    /// [`reset_caches`]: Database::reset_caches
    pub fn get_tables(&mut self) -> Result<Vec<String>, DmlError> {
        if let Some(tables) = &self.tables {
            return Ok(tables.clone());
        }
        let prefix = self.config.prefix.clone();
        self.query_start(&format!("-- tables {prefix}*"), &Params::none(), QueryType::Aux);
        let result = self.driver.get_tables(&prefix);
        let tables = self.query_end(result)?;
        self.tables = Some(tables.clone());
        Ok(tables)
    }

    /// Column descriptors of `table`, cached per connection.
    ///
    /// # Errors
    /// Returns `DmlError::ReadError` if the engine cannot describe the table.
    pub fn get_columns(&mut self, table: &str) -> Result<Arc<Vec<ColumnInfo>>, DmlError> {
        if let Some(columns) = self.columns.get(table) {
            return Ok(Arc::clone(columns));
        }
        let full = self.physical_name(table);
        self.query_start(&format!("-- columns {full}"), &Params::none(), QueryType::Aux);
        let result = self.driver.get_columns(&full);
        let columns = Arc::new(self.query_end(result)?);
        self.columns.insert(table.to_string(), Arc::clone(&columns));
        Ok(columns)
    }

    /// # Errors
    /// Returns `DmlError::ReadError` if the engine cannot list indexes.
    pub fn get_indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>, DmlError> {
        let full = self.physical_name(table);
        self.query_start(&format!("-- indexes {full}"), &Params::none(), QueryType::Aux);
        let result = self.driver.get_indexes(&full);
        self.query_end(result)
    }

    /// Drop all cached table and column metadata.
    pub fn reset_caches(&mut self) {
        self.tables = None;
        self.columns.clear();
    }

    /// Build an `= ?` / `IN (...)` fragment. Named markers are numbered from a counter
    /// kept per connection, so fragments built for one statement never collide.
    ///
    /// # Errors
    /// See [`InOrEqualBuilder::build`].
    pub fn get_in_or_equal(&mut self, builder: InOrEqualBuilder) -> Result<InOrEqual, DmlError> {
        let (fragment, next) = builder.build(self.in_or_equal_index)?;
        self.in_or_equal_index = next;
        Ok(fragment)
    }

    pub(crate) fn physical_name(&self, table: &str) -> String {
        format!("{}{table}", self.config.prefix)
    }

    /// Apply the table prefix and rewrite placeholders for this driver.
    pub(crate) fn prepare(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<NormalizedQuery, DmlError> {
        let sql = fix_table_names(sql, &self.config.prefix);
        normalize_params(&sql, params.into(), self.driver.allowed_param_types())
    }

    /// Close the connection.
    ///
    /// Rolls back an open transaction first so the session flush commits on its own.
    /// Then releases a held session lock and disposes the driver. Later calls do
    /// nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if self.in_transaction {
            tracing::error!("disposing a connection with an open transaction, rolling back");
            if let Err(e) = self.rollback() {
                tracing::warn!("rollback during dispose failed: {e}");
            }
        }
        if self.used_for_db_sessions {
            if let Some(flush) = self.session_flush.take() {
                if let Err(e) = flush(self) {
                    tracing::warn!("session flush before dispose failed: {e}");
                }
            }
        }
        if let Some(rowid) = self.session_lock {
            if let Err(e) = self.release_session_lock(rowid) {
                tracing::warn!("session lock {rowid} not released during dispose: {e}");
            }
        }
        self.driver.dispose();
        self.reset_caches();
        self.generator = None;
        self.disposed = true;
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("family", &self.driver.family())
            .field("prefix", &self.config.prefix)
            .field("in_transaction", &self.in_transaction)
            .field("session_lock", &self.session_lock)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

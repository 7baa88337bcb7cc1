//! A driver that records every statement and answers queries from a script.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dml_middleware::driver::{ColumnInfo, Driver, IndexInfo, MetaType, ServerInfo};
use dml_middleware::prelude::*;
use dml_middleware::recordset::BufferedCursor;
use dml_middleware::translation::NormalizedQuery;

#[derive(Debug, Default)]
pub struct Script {
    /// Every statement the driver saw, in order.
    pub statements: Vec<NormalizedQuery>,
    /// Row batches handed out by successive `query` calls.
    pub responses: VecDeque<Vec<Vec<RowValues>>>,
    pub response_columns: Vec<String>,
    pub table_columns: Vec<ColumnInfo>,
    /// Fail the next `execute` or `query` with this engine message.
    pub fail_next: Option<String>,
    pub lock_events: Vec<String>,
    pub disposed: bool,
}

impl Script {
    pub fn sql(&self) -> Vec<String> {
        self.statements.iter().map(|q| q.sql.clone()).collect()
    }
}

pub struct ScriptedDriver {
    script: Arc<Mutex<Script>>,
    family: DatabaseType,
    allowed: ParamStyles,
    transactions: bool,
    session_locks: bool,
    last_error: Option<String>,
}

impl ScriptedDriver {
    pub fn new(family: DatabaseType, allowed: ParamStyles) -> (Self, Arc<Mutex<Script>>) {
        let script = Arc::new(Mutex::new(Script {
            response_columns: vec!["id".into(), "name".into()],
            table_columns: vec![column("id", MetaType::Integer), column("name", MetaType::Char)],
            ..Script::default()
        }));
        (
            Self {
                script: Arc::clone(&script),
                family,
                allowed,
                transactions: true,
                session_locks: false,
                last_error: None,
            },
            script,
        )
    }

    pub fn without_transactions(mut self) -> Self {
        self.transactions = false;
        self
    }

    pub fn with_session_locks(mut self) -> Self {
        self.session_locks = true;
        self
    }

    fn record(&mut self, query: &NormalizedQuery) -> Result<(), DmlError> {
        let mut script = self.script.lock().unwrap();
        script.statements.push(query.clone());
        if let Some(message) = script.fail_next.take() {
            self.last_error = Some(message.clone());
            return Err(DmlError::ConnectionError(message));
        }
        self.last_error = None;
        Ok(())
    }
}

pub fn column(name: &str, meta_type: MetaType) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        type_name: String::new(),
        meta_type,
        max_length: None,
        not_null: false,
        has_default: false,
        default_value: None,
        primary_key: name == "id",
        auto_increment: name == "id",
    }
}

impl Driver for ScriptedDriver {
    fn family(&self) -> DatabaseType {
        self.family
    }

    fn connect(&mut self, _config: &ConnectionConfig) -> Result<(), DmlError> {
        Ok(())
    }

    fn dispose(&mut self) {
        self.script.lock().unwrap().disposed = true;
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }

    fn allowed_param_types(&self) -> ParamStyles {
        self.allowed
    }

    fn execute(&mut self, query: &NormalizedQuery) -> Result<usize, DmlError> {
        self.record(query)?;
        Ok(1)
    }

    fn query(&mut self, query: &NormalizedQuery) -> Result<Box<dyn Cursor>, DmlError> {
        self.record(query)?;
        let mut script = self.script.lock().unwrap();
        let columns = Arc::new(script.response_columns.clone());
        let rows = script.responses.pop_front().unwrap_or_default();
        let records = rows
            .into_iter()
            .map(|values| Record::new(Arc::clone(&columns), values))
            .collect();
        Ok(Box::new(BufferedCursor::new(records)))
    }

    fn last_insert_id(&mut self, _table: &str) -> Result<Option<i64>, DmlError> {
        Ok(Some(42))
    }

    fn get_tables(&mut self, _prefix: &str) -> Result<Vec<String>, DmlError> {
        Ok(vec!["widgets".into()])
    }

    fn get_columns(&mut self, _table: &str) -> Result<Vec<ColumnInfo>, DmlError> {
        Ok(self.script.lock().unwrap().table_columns.clone())
    }

    fn get_indexes(&mut self, _table: &str) -> Result<Vec<IndexInfo>, DmlError> {
        Ok(Vec::new())
    }

    fn transactions_supported(&self) -> bool {
        self.transactions
    }

    fn session_lock_supported(&self) -> bool {
        self.session_locks
    }

    fn acquire_session_lock(&mut self, rowid: i64, _timeout: Duration) -> Result<(), DmlError> {
        let mut script = self.script.lock().unwrap();
        if let Some(message) = script.fail_next.take() {
            return Err(DmlError::ConnectionError(message));
        }
        script.lock_events.push(format!("acquire {rowid}"));
        Ok(())
    }

    fn release_session_lock(&mut self, rowid: i64) -> Result<(), DmlError> {
        self.script
            .lock()
            .unwrap()
            .lock_events
            .push(format!("release {rowid}"));
        Ok(())
    }

    fn server_info(&self) -> ServerInfo {
        ServerInfo {
            description: "scripted".into(),
            version: "0".into(),
        }
    }
}

/// A database over a scripted driver.
pub fn scripted(
    family: DatabaseType,
    allowed: ParamStyles,
    prefix: &str,
) -> (Database, Arc<Mutex<Script>>) {
    let (driver, script) = ScriptedDriver::new(family, allowed);
    let config = ConnectionConfig::builder(family).prefix(prefix).finish();
    let db = Database::with_driver(Box::new(driver), config).unwrap();
    (db, script)
}

#[cfg(feature = "sqlite")]
pub const WIDGETS_DDL: &str = "CREATE TABLE {widgets} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(40),
    visible INTEGER NOT NULL DEFAULT 1
)";

/// In-memory `SQLite` database with an empty `widgets` table under prefix `mdl_`.
#[cfg(feature = "sqlite")]
pub fn sqlite_widgets(options: DbOptions) -> Result<Database, DmlError> {
    let config = ConnectionConfig::builder(DatabaseType::Sqlite)
        .prefix("mdl_")
        .options(options)
        .finish();
    let mut db = Database::connect(config)?;
    db.set_skip_logging(true);
    db.execute(WIDGETS_DDL, Params::none())?;
    db.set_skip_logging(false);
    Ok(db)
}

/// The bundled `SQLite` driver with no-op session locks, for checking disposal against
/// real storage.
#[cfg(feature = "sqlite")]
#[derive(Default)]
pub struct SessionSqlite(dml_middleware::sqlite::SqliteDriver);

#[cfg(feature = "sqlite")]
impl Driver for SessionSqlite {
    fn family(&self) -> DatabaseType {
        self.0.family()
    }

    fn connect(&mut self, config: &ConnectionConfig) -> Result<(), DmlError> {
        self.0.connect(config)
    }

    fn dispose(&mut self) {
        self.0.dispose();
    }

    fn last_error(&self) -> Option<String> {
        self.0.last_error()
    }

    fn allowed_param_types(&self) -> ParamStyles {
        self.0.allowed_param_types()
    }

    fn execute(&mut self, query: &NormalizedQuery) -> Result<usize, DmlError> {
        self.0.execute(query)
    }

    fn query(&mut self, query: &NormalizedQuery) -> Result<Box<dyn Cursor>, DmlError> {
        self.0.query(query)
    }

    fn last_insert_id(&mut self, table: &str) -> Result<Option<i64>, DmlError> {
        self.0.last_insert_id(table)
    }

    fn get_tables(&mut self, prefix: &str) -> Result<Vec<String>, DmlError> {
        self.0.get_tables(prefix)
    }

    fn get_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, DmlError> {
        self.0.get_columns(table)
    }

    fn get_indexes(&mut self, table: &str) -> Result<Vec<IndexInfo>, DmlError> {
        self.0.get_indexes(table)
    }

    fn session_lock_supported(&self) -> bool {
        true
    }

    fn acquire_session_lock(&mut self, _rowid: i64, _timeout: Duration) -> Result<(), DmlError> {
        Ok(())
    }

    fn release_session_lock(&mut self, _rowid: i64) -> Result<(), DmlError> {
        Ok(())
    }

    fn server_info(&self) -> ServerInfo {
        self.0.server_info()
    }
}

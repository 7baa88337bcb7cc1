//! Single-depth transactions and the per-connection session lock.
//!
//! A connection holds at most one open transaction: there is no nesting and no
//! savepoint. Misuse (begin twice, commit or rollback with nothing open) is logged,
//! refused with `InvalidUsage` and leaves the state as it was.

use std::time::Duration;

use tracing::error;

use crate::database::{Database, SessionFlush};
use crate::error::DmlError;
use crate::types::{Params, QueryType};

impl Database {
    #[must_use]
    pub fn is_transaction_started(&self) -> bool {
        self.in_transaction
    }

    /// Open a transaction. A no-op on engines without transactions.
    ///
    /// # Errors
    /// Returns `DmlError::InvalidUsage` if a transaction is already open, or the
    /// engine's read error if `BEGIN` fails.
    pub fn begin_transaction(&mut self) -> Result<(), DmlError> {
        if !self.driver.transactions_supported() {
            return Ok(());
        }
        if self.in_transaction {
            error!("begin_transaction: a transaction is already in progress");
            return Err(DmlError::InvalidUsage(
                "a transaction is already in progress".to_string(),
            ));
        }
        self.run_control(self.dialect().begin_sql())?;
        self.in_transaction = true;
        Ok(())
    }

    /// # Errors
    /// Returns `DmlError::InvalidUsage` if no transaction is open, or the engine's
    /// error if `COMMIT` fails.
    pub fn commit(&mut self) -> Result<(), DmlError> {
        self.finish_transaction("commit", self.dialect().commit_sql())
    }

    /// # Errors
    /// Returns `DmlError::InvalidUsage` if no transaction is open, or the engine's
    /// error if `ROLLBACK` fails.
    pub fn rollback(&mut self) -> Result<(), DmlError> {
        self.finish_transaction("rollback", self.dialect().rollback_sql())
    }

    /// Run `work` inside a transaction: commit when it returns `Ok`, roll back when it
    /// returns `Err`.
    ///
    /// # Errors
    /// Returns the error from `work`, or from begin/commit.
    pub fn transaction<T, F>(&mut self, work: F) -> Result<T, DmlError>
    where
        F: FnOnce(&mut Database) -> Result<T, DmlError>,
    {
        self.begin_transaction()?;
        match work(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if self.in_transaction {
                    if let Err(rollback_error) = self.rollback() {
                        error!("rollback after failed transaction also failed: {rollback_error}");
                    }
                }
                Err(e)
            }
        }
    }

    fn finish_transaction(&mut self, action: &str, sql: &str) -> Result<(), DmlError> {
        if !self.driver.transactions_supported() {
            return Ok(());
        }
        if !self.in_transaction {
            error!("{action}: no transaction in progress");
            return Err(DmlError::InvalidUsage(format!(
                "{action} without a transaction in progress"
            )));
        }
        // The transaction is over on the engine side even if the statement errors.
        self.in_transaction = false;
        self.run_control(sql)
    }

    fn run_control(&mut self, sql: &str) -> Result<(), DmlError> {
        let query = self.prepare(sql, Params::none())?;
        self.query_start(&query.sql, &query.params, QueryType::Aux);
        let result = self.driver.execute(&query);
        self.query_end(result).map(|_| ())
    }

    #[must_use]
    pub fn session_lock_supported(&self) -> bool {
        self.driver.session_lock_supported()
    }

    /// True once a session lock has been taken on this connection.
    #[must_use]
    pub fn used_for_db_sessions(&self) -> bool {
        self.used_for_db_sessions
    }

    /// Register the hook [`Database::dispose`] runs before closing a connection that
    /// stores sessions.
    pub fn set_session_flush(&mut self, flush: SessionFlush) {
        self.session_flush = Some(flush);
    }

    /// Take the session lock for `rowid`.
    ///
    /// # Errors
    /// Returns `DmlError::Unimplemented` when the engine has no session locks,
    /// `DmlError::InvalidUsage` when a lock is already held, or the driver's error when
    /// the lock cannot be acquired within `timeout`.
    pub fn get_session_lock(&mut self, rowid: i64, timeout: Duration) -> Result<(), DmlError> {
        if !self.driver.session_lock_supported() {
            return Err(DmlError::Unimplemented(format!(
                "session locks on {}",
                self.driver.family()
            )));
        }
        if let Some(held) = self.session_lock {
            error!("get_session_lock({rowid}): lock {held} is still held");
            return Err(DmlError::InvalidUsage(format!(
                "session lock {held} is still held"
            )));
        }
        self.driver.acquire_session_lock(rowid, timeout)?;
        self.used_for_db_sessions = true;
        self.session_lock = Some(rowid);
        Ok(())
    }

    /// # Errors
    /// Returns `DmlError::InvalidUsage` when `rowid` is not the lock held, or the
    /// driver's error.
    pub fn release_session_lock(&mut self, rowid: i64) -> Result<(), DmlError> {
        if self.session_lock != Some(rowid) {
            error!("release_session_lock({rowid}): lock not held");
            return Err(DmlError::InvalidUsage(format!(
                "session lock {rowid} is not held"
            )));
        }
        self.session_lock = None;
        self.driver.release_session_lock(rowid)
    }
}

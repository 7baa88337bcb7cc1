//! Per-statement bookkeeping.
//!
//! Every statement a [`Database`] runs is bracketed by `query_start` and `query_end`:
//! the first records what is about to run and bumps the read or write counter, the
//! second times it, writes a query-log row when the logging policy asks for one and
//! turns driver failures into typed read, write or structure errors.
//!
//! Log rows are written through [`Database::insert_record_raw`]. While that insert runs
//! the re-entrancy flag is set and both `query_start` and `query_log` return at once,
//! so the log write is never itself counted or logged.

use std::backtrace::Backtrace;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::info;

use crate::config::DbOptions;
use crate::database::Database;
use crate::error::DmlError;
use crate::field_map::FieldMap;
use crate::types::{Params, QueryType};

/// Slack added to the elapsed time before comparing against the slow threshold.
const SLOW_EPSILON: f64 = 0.000_01;

/// The statement currently in flight.
#[derive(Debug, Clone)]
pub struct QueryDescriptor {
    pub sql: String,
    pub params: JsonValue,
    pub qtype: QueryType,
    pub started: Instant,
}

/// One row of the query log table.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryLogEntry {
    pub qtype: QueryType,
    pub sqltext: String,
    pub sqlparams: String,
    pub error: bool,
    pub info: Option<String>,
    pub backtrace: String,
    pub exectime: f64,
    pub timelogged: i64,
}

impl QueryLogEntry {
    #[must_use]
    pub fn to_field_map(&self) -> FieldMap {
        FieldMap::new()
            .with("qtype", self.qtype.code())
            .with("sqltext", self.sqltext.as_str())
            .with("sqlparams", self.sqlparams.as_str())
            .with("error", i64::from(self.error))
            .with("info", self.info.clone())
            .with("backtrace", self.backtrace.as_str())
            .with("exectime", self.exectime)
            .with("timelogged", self.timelogged)
    }
}

/// Counters and flags owned by one connection.
#[derive(Debug, Default)]
pub struct Instrumentation {
    pub(crate) last: Option<QueryDescriptor>,
    pub(crate) reads: u64,
    pub(crate) writes: u64,
    pub(crate) queries_time: f64,
    pub(crate) debug: bool,
    /// Set while a log row is being written.
    pub(crate) logging_query: bool,
    /// Set to suspend query logging, e.g. while the log table itself is being created.
    pub(crate) skip_logging: bool,
}

impl Instrumentation {
    #[must_use]
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }
}

/// Whether a finished statement deserves a log row.
#[must_use]
pub fn should_log(options: &DbOptions, elapsed: f64, failed: bool) -> bool {
    options.logall
        || options
            .logslow
            .is_some_and(|threshold| threshold < elapsed + SLOW_EPSILON)
        || (failed && options.logerrors)
}

impl Database {
    /// Reads issued on this connection, including auxiliary queries.
    #[must_use]
    pub fn perf_reads(&self) -> u64 {
        self.instr.reads
    }

    /// Inserts, updates and structure changes issued on this connection.
    #[must_use]
    pub fn perf_writes(&self) -> u64 {
        self.instr.writes
    }

    #[must_use]
    pub fn perf_queries(&self) -> u64 {
        self.instr.reads + self.instr.writes
    }

    /// Seconds spent inside the driver.
    #[must_use]
    pub fn perf_queries_time(&self) -> f64 {
        self.instr.queries_time
    }

    /// The statement in flight, if any. Cleared as soon as it finishes.
    #[must_use]
    pub fn last_query(&self) -> Option<&QueryDescriptor> {
        self.instr.last.as_ref()
    }

    /// Suspend or resume query logging for this connection.
    pub fn set_skip_logging(&mut self, skip: bool) {
        self.instr.skip_logging = skip;
    }

    pub(crate) fn query_start(&mut self, sql: &str, params: &Params, qtype: QueryType) {
        if self.instr.logging_query {
            return;
        }
        if qtype.is_read() {
            self.instr.reads += 1;
        } else {
            self.instr.writes += 1;
        }
        let params = params.to_json();
        if self.instr.debug {
            info!(target: "dml_middleware::debug", qtype = qtype.code(), %params, "{sql}");
        }
        self.instr.last = Some(QueryDescriptor {
            sql: sql.to_string(),
            params,
            qtype,
            started: Instant::now(),
        });
    }

    /// Close the bracket opened by `query_start`, typing any driver failure.
    pub(crate) fn query_end<T>(&mut self, result: Result<T, DmlError>) -> Result<T, DmlError> {
        if self.instr.logging_query {
            return result;
        }
        match result {
            Ok(value) => {
                self.query_log(None);
                self.instr.last = None;
                Ok(value)
            }
            Err(e) => {
                let message = self.driver.last_error().unwrap_or_else(|| e.to_string());
                self.query_log(Some(message.clone()));
                let Some(last) = self.instr.last.take() else {
                    return Err(e);
                };
                let sql = last.sql;
                let params = last.params.to_string();
                Err(match last.qtype {
                    QueryType::Select | QueryType::Aux => DmlError::ReadError {
                        message,
                        sql,
                        params,
                    },
                    QueryType::Insert | QueryType::Update => DmlError::WriteError {
                        message,
                        sql,
                        params,
                    },
                    QueryType::Structure => DmlError::StructureError {
                        message,
                        sql,
                        generator: self.sql_generator().name(),
                    },
                })
            }
        }
    }

    /// Account for the finished statement and write a log row if policy asks for one.
    /// Failures of the log write itself are discarded.
    pub(crate) fn query_log(&mut self, error: Option<String>) {
        if self.instr.logging_query {
            return;
        }
        let Some(last) = &self.instr.last else {
            return;
        };
        let elapsed = last.started.elapsed().as_secs_f64();
        self.instr.queries_time += elapsed;

        let failed = error.is_some();
        if self.instr.skip_logging || !should_log(&self.config.options, elapsed, failed) {
            return;
        }
        let entry = QueryLogEntry {
            qtype: last.qtype,
            sqltext: last.sql.clone(),
            sqlparams: last.params.to_string(),
            error: failed,
            info: error,
            backtrace: Backtrace::force_capture().to_string(),
            exectime: elapsed,
            timelogged: Utc::now().timestamp(),
        };
        let table = self.config.options.log_table.clone();

        self.instr.logging_query = true;
        let written = self.insert_record_raw(&table, entry.to_field_map(), false, false);
        self.instr.logging_query = false;
        if let Err(e) = written {
            tracing::debug!("query log write discarded: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_policy() {
        let mut options = DbOptions::default();
        assert!(!should_log(&options, 10.0, true));

        options.logerrors = true;
        assert!(should_log(&options, 0.0, true));
        assert!(!should_log(&options, 0.0, false));

        options.logslow = Some(0.5);
        assert!(should_log(&options, 0.6, false));
        assert!(should_log(&options, 0.499_999, false));
        assert!(!should_log(&options, 0.1, false));

        options.logall = true;
        assert!(should_log(&options, 0.0, false));
    }

    #[test]
    fn log_entry_fields() {
        let entry = QueryLogEntry {
            qtype: QueryType::Update,
            sqltext: "UPDATE t SET a = ?".into(),
            sqlparams: "[1]".into(),
            error: true,
            info: Some("locked".into()),
            backtrace: String::new(),
            exectime: 0.25,
            timelogged: 1_700_000_000,
        };
        let map = entry.to_field_map();
        assert_eq!(
            map.keys().collect::<Vec<_>>(),
            vec![
                "qtype",
                "sqltext",
                "sqlparams",
                "error",
                "info",
                "backtrace",
                "exectime",
                "timelogged"
            ]
        );
        assert_eq!(map.get("qtype"), Some(&crate::types::RowValues::Int(3)));
        assert_eq!(map.get("error"), Some(&crate::types::RowValues::Int(1)));
    }
}

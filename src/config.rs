use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::DmlError;
use crate::types::DatabaseType;

fn default_log_table() -> String {
    "log_queries".to_string()
}

/// Driver options: query-log policy plus an open-ended map for driver-specific settings
/// (socket paths, ports, pragmas...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbOptions {
    /// Log every statement.
    #[serde(default)]
    pub logall: bool,
    /// Log statements slower than this many seconds.
    #[serde(default)]
    pub logslow: Option<f64>,
    /// Log statements that failed.
    #[serde(default)]
    pub logerrors: bool,
    /// Table (without prefix) that receives log rows.
    #[serde(default = "default_log_table")]
    pub log_table: String,
    /// Echo every statement to the debug sink.
    #[serde(default)]
    pub debug: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            logall: false,
            logslow: None,
            logerrors: false,
            log_table: default_log_table(),
            debug: false,
            extra: BTreeMap::new(),
        }
    }
}

impl DbOptions {
    /// True when any logging policy is switched on.
    #[must_use]
    pub fn logging_enabled(&self) -> bool {
        self.logall || self.logslow.is_some() || self.logerrors
    }

    #[must_use]
    pub fn extra(&self, key: &str) -> Option<&JsonValue> {
        self.extra.get(key)
    }
}

/// Connection settings. Fixed once the connection is open; see
/// [`crate::Database::export_config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub db_type: DatabaseType,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub dbname: String,
    /// Prefix prepended to every `{table}` reference.
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub options: DbOptions,
}

impl ConnectionConfig {
    #[must_use]
    pub fn builder(db_type: DatabaseType) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new(db_type)
    }

    /// Parse a configuration from JSON.
    ///
    /// # Errors
    /// Returns `DmlError::ConnectionError` if the JSON does not describe a configuration.
    pub fn from_json(json: &str) -> Result<Self, DmlError> {
        serde_json::from_str(json)
            .map_err(|e| DmlError::ConnectionError(format!("invalid connection config: {e}")))
    }
}

/// Fluent builder for [`ConnectionConfig`].
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    cfg: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    #[must_use]
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            cfg: ConnectionConfig {
                db_type,
                host: String::new(),
                user: String::new(),
                password: String::new(),
                dbname: String::new(),
                prefix: String::new(),
                options: DbOptions::default(),
            },
        }
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.cfg.host = host.into();
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.cfg.user = user.into();
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.cfg.password = password.into();
        self
    }

    #[must_use]
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.cfg.dbname = dbname.into();
        self
    }

    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cfg.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn options(mut self, options: DbOptions) -> Self {
        self.cfg.options = options;
        self
    }

    #[must_use]
    pub fn log_all(mut self, enabled: bool) -> Self {
        self.cfg.options.logall = enabled;
        self
    }

    #[must_use]
    pub fn log_slow(mut self, seconds: f64) -> Self {
        self.cfg.options.logslow = Some(seconds);
        self
    }

    #[must_use]
    pub fn log_errors(mut self, enabled: bool) -> Self {
        self.cfg.options.logerrors = enabled;
        self
    }

    #[must_use]
    pub fn debug(mut self, enabled: bool) -> Self {
        self.cfg.options.debug = enabled;
        self
    }

    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.cfg.options.extra.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectionConfig {
        self.cfg
    }
}

use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;

/// Errors raised by the record access core.
///
/// The read, write and structure variants carry the statement that failed so a caller
/// can report it; the parameters are kept in their logged (JSON) form.
#[derive(Debug, Error)]
pub enum DmlError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Error reading from database: {message}\n{sql}\n[{params}]")]
    ReadError {
        message: String,
        sql: String,
        params: String,
    },

    #[error("Error writing to database: {message}\n{sql}\n[{params}]")]
    WriteError {
        message: String,
        sql: String,
        params: String,
    },

    #[error("Structure change ({generator}) failed: {message}\n{sql}")]
    StructureError {
        message: String,
        sql: String,
        generator: String,
    },

    #[error("Can not find data record in database: {sql} [{params}]")]
    MissingRecord { sql: String, params: String },

    #[error("Error: found more than one record where only one was expected: {sql} [{params}]")]
    MultipleRecords { sql: String, params: String },

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl DmlError {
    /// True for the two strict-lookup outcomes.
    #[must_use]
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            DmlError::MissingRecord { .. } | DmlError::MultipleRecords { .. }
        )
    }
}

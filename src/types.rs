use std::collections::BTreeMap;
use std::fmt;
use std::ops::BitOr;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values that can be stored in a database row or used as query parameters.
///
/// The same enum is used by every driver so helper code never branches on engine types:
/// ```rust
/// use dml_middleware::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RowValues::Bool(value) => Some(*value),
            RowValues::Int(1) => Some(true),
            RowValues::Int(0) => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Integer view used by counts and generated ids: integers, integral floats and
    /// numeric text all qualify.
    #[must_use]
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            RowValues::Int(i) => Some(*i),
            RowValues::Bool(b) => Some(i64::from(*b)),
            #[allow(clippy::cast_possible_truncation)]
            RowValues::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            RowValues::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text form used as a key in keyed result maps.
    #[must_use]
    pub fn to_key(&self) -> String {
        match self {
            RowValues::Int(i) => i.to_string(),
            RowValues::Float(f) => f.to_string(),
            RowValues::Text(s) => s.clone(),
            RowValues::Bool(b) => i64::from(*b).to_string(),
            RowValues::Timestamp(dt) => dt.format("%F %T%.f").to_string(),
            RowValues::Null => String::new(),
            RowValues::JSON(v) => v.to_string(),
            RowValues::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    /// JSON form used when logging parameters and when hydrating structs.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            RowValues::Int(i) => JsonValue::from(*i),
            RowValues::Float(f) => JsonValue::from(*f),
            RowValues::Text(s) => JsonValue::from(s.as_str()),
            RowValues::Bool(b) => JsonValue::from(*b),
            RowValues::Timestamp(dt) => JsonValue::from(dt.format("%F %T%.f").to_string()),
            RowValues::Null => JsonValue::Null,
            RowValues::JSON(v) => v.clone(),
            RowValues::Blob(bytes) => {
                JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect())
            }
        }
    }

    /// Inverse of [`RowValues::to_json`] for scalar JSON; arrays and objects stay JSON.
    #[must_use]
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => RowValues::Null,
            JsonValue::Bool(b) => RowValues::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => RowValues::Int(i),
                None => RowValues::Float(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => RowValues::Text(s.clone()),
            other => RowValues::JSON(other.clone()),
        }
    }
}

impl From<i64> for RowValues {
    fn from(value: i64) -> Self {
        RowValues::Int(value)
    }
}

impl From<i32> for RowValues {
    fn from(value: i32) -> Self {
        RowValues::Int(i64::from(value))
    }
}

impl From<f64> for RowValues {
    fn from(value: f64) -> Self {
        RowValues::Float(value)
    }
}

impl From<bool> for RowValues {
    fn from(value: bool) -> Self {
        RowValues::Bool(value)
    }
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl From<String> for RowValues {
    fn from(value: String) -> Self {
        RowValues::Text(value)
    }
}

impl From<NaiveDateTime> for RowValues {
    fn from(value: NaiveDateTime) -> Self {
        RowValues::Timestamp(value)
    }
}

impl From<Vec<u8>> for RowValues {
    fn from(value: Vec<u8>) -> Self {
        RowValues::Blob(value)
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// The database family a connection talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// `SQLite` database
    Sqlite,
    /// `PostgreSQL` database
    Postgres,
    /// `MySQL` / `MariaDB` database
    Mysql,
    /// SQL Server database
    Mssql,
}

impl DatabaseType {
    /// Family name used to derive per-family helper names (`<family>_sql_generator`).
    #[must_use]
    pub fn family(self) -> &'static str {
        match self {
            DatabaseType::Sqlite => "sqlite",
            DatabaseType::Postgres => "postgres",
            DatabaseType::Mysql => "mysql",
            DatabaseType::Mssql => "mssql",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.family())
    }
}

/// A single placeholder style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamStyle {
    /// `:name`
    Named,
    /// `?`
    Positional,
    /// `$1`, `$2`, ...
    Ordinal,
}

impl ParamStyle {
    fn bit(self) -> u8 {
        match self {
            ParamStyle::Named => 1,
            ParamStyle::Positional => 2,
            ParamStyle::Ordinal => 4,
        }
    }
}

/// Set of placeholder styles a driver accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamStyles(u8);

impl ParamStyles {
    pub const NAMED: ParamStyles = ParamStyles(1);
    pub const POSITIONAL: ParamStyles = ParamStyles(2);
    pub const ORDINAL: ParamStyles = ParamStyles(4);

    #[must_use]
    pub fn contains(self, style: ParamStyle) -> bool {
        self.0 & style.bit() != 0
    }

    /// The style to emit when a statement carries no placeholders at all.
    #[must_use]
    pub fn preferred(self) -> ParamStyle {
        if self.contains(ParamStyle::Named) {
            ParamStyle::Named
        } else if self.contains(ParamStyle::Positional) {
            ParamStyle::Positional
        } else {
            ParamStyle::Ordinal
        }
    }
}

impl From<ParamStyle> for ParamStyles {
    fn from(style: ParamStyle) -> Self {
        ParamStyles(style.bit())
    }
}

impl BitOr for ParamStyles {
    type Output = ParamStyles;

    fn bitor(self, rhs: Self) -> Self::Output {
        ParamStyles(self.0 | rhs.0)
    }
}

/// Parameters for one statement: a name map or a positional list, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Named(BTreeMap<String, RowValues>),
    Positional(Vec<RowValues>),
}

impl Default for Params {
    fn default() -> Self {
        Params::Positional(Vec::new())
    }
}

impl Params {
    #[must_use]
    pub fn none() -> Self {
        Params::default()
    }

    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RowValues>,
    {
        Params::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Params::Named(map) => map.len(),
            Params::Positional(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values in bind order. Named maps yield their values in key order.
    #[must_use]
    pub fn values(&self) -> Vec<RowValues> {
        match self {
            Params::Named(map) => map.values().cloned().collect(),
            Params::Positional(values) => values.clone(),
        }
    }

    /// Serialized form stored in the query log and carried by errors.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Params::Named(map) => JsonValue::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Params::Positional(values) => {
                JsonValue::Array(values.iter().map(RowValues::to_json).collect())
            }
        }
    }
}

impl From<Vec<RowValues>> for Params {
    fn from(values: Vec<RowValues>) -> Self {
        Params::Positional(values)
    }
}

impl From<BTreeMap<String, RowValues>> for Params {
    fn from(map: BTreeMap<String, RowValues>) -> Self {
        Params::Named(map)
    }
}

/// Classification of a statement for counters, logging and error typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Structure,
    /// Driver-internal statements such as metadata introspection or `BEGIN`.
    Aux,
}

impl QueryType {
    /// Numeric code stored in the `qtype` column of the query log.
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            QueryType::Select => 1,
            QueryType::Insert => 2,
            QueryType::Update => 3,
            QueryType::Structure => 4,
            QueryType::Aux => 5,
        }
    }

    #[must_use]
    pub fn is_read(self) -> bool {
        matches!(self, QueryType::Select | QueryType::Aux)
    }
}

/// What a single-record lookup does when it matches zero or several rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Zero rows → `None`; several rows → warning, first row returned.
    #[default]
    IgnoreMissing,
    /// Several rows → first row, silently. Discouraged.
    IgnoreMultiple,
    /// Zero rows → `MissingRecord`; several rows → `MultipleRecords`.
    MustExist,
}

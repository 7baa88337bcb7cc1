//! WHERE fragments built from structured filters.

use crate::error::DmlError;
use crate::field_map::FieldMap;
use crate::translation::MAX_PARAM_NAME_LEN;
use crate::types::{ParamStyle, Params, RowValues};

/// AND-combined equality tests for every entry of `conditions`.
///
/// `Null` values become `field IS NULL` and bind nothing. With `ParamStyle::Named` each
/// field gets a placeholder derived from its name; any other style yields `?` markers.
/// An empty map yields an empty clause, which callers treat as "no filter".
///
/// # Errors
/// Returns `DmlError::InvalidUsage` when a key is numeric.
pub fn where_clause(
    conditions: &FieldMap,
    style: ParamStyle,
) -> Result<(String, Params), DmlError> {
    let named = style == ParamStyle::Named;
    if conditions.is_empty() {
        return Ok((String::new(), empty_params(named)));
    }

    let mut tests = Vec::with_capacity(conditions.len());
    let mut names: Vec<String> = Vec::new();
    let mut values: Vec<RowValues> = Vec::new();
    for (field, value) in conditions.iter() {
        if field.is_empty() || field.chars().all(|c| c.is_ascii_digit()) {
            return Err(DmlError::InvalidUsage(format!(
                "conditions must be keyed by field name, got '{field}'"
            )));
        }
        if value.is_null() {
            tests.push(format!("{field} IS NULL"));
            continue;
        }
        if named {
            let name = placeholder_name(field, &names);
            tests.push(format!("{field} = :{name}"));
            names.push(name);
        } else {
            tests.push(format!("{field} = ?"));
        }
        values.push(value.clone());
    }

    let params = if named {
        Params::named(names.into_iter().zip(values))
    } else {
        Params::Positional(values)
    };
    Ok((tests.join(" AND "), params))
}

/// OR-combined equality tests of `field` against `values`, as positional markers.
///
/// An empty list yields `1 = 2`, which matches no row, so a caller can never turn an
/// empty filter into an unbounded read or delete.
#[must_use]
pub fn where_clause_list(field: &str, values: &[RowValues]) -> (String, Params) {
    if values.is_empty() {
        return ("1 = 2".to_string(), Params::none());
    }
    let has_null = values.iter().any(RowValues::is_null);
    let bound: Vec<RowValues> = values.iter().filter(|v| !v.is_null()).cloned().collect();

    let test = match bound.len() {
        0 => String::new(),
        1 => format!("{field} = ?"),
        n => format!("{field} IN ({})", vec!["?"; n].join(",")),
    };
    let sql = match (has_null, test.is_empty()) {
        (true, true) => format!("{field} IS NULL"),
        (true, false) => format!("({field} IS NULL OR {test})"),
        (false, _) => test,
    };
    (sql, Params::Positional(bound))
}

/// What [`InOrEqualBuilder`] emits when it has no items.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OnEmpty {
    /// Refuse with `InvalidUsage`.
    #[default]
    Reject,
    /// `IN (NULL)` or `NOT IN (NULL)`; neither matches any row.
    MatchNone,
    /// `IS NULL` or `IS NOT NULL`.
    IsNull,
    /// Behave as if this single item had been supplied.
    Value(RowValues),
}

#[derive(Debug, Clone, PartialEq)]
enum Markers {
    Positional,
    Named(String),
}

/// Fragment produced by [`InOrEqualBuilder::build`], ready to follow a field name.
#[derive(Debug, Clone, PartialEq)]
pub struct InOrEqual {
    pub sql: String,
    pub params: Params,
}

/// Builds `= ?` / `IN (?,...)` fragments and their negations.
///
/// ```rust
/// use dml_middleware::prelude::*;
///
/// let (frag, _) = InOrEqualBuilder::new([RowValues::Int(4)]).build(0).unwrap();
/// assert_eq!(frag.sql, "= ?");
///
/// let (frag, next) = InOrEqualBuilder::new([1, 2])
///     .named("cat")
///     .negated()
///     .build(7)
///     .unwrap();
/// assert_eq!(frag.sql, "NOT IN (:cat7,:cat8)");
/// assert_eq!(next, 9);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InOrEqualBuilder {
    items: Vec<RowValues>,
    markers: Markers,
    equal: bool,
    on_empty: OnEmpty,
}

impl InOrEqualBuilder {
    pub fn new<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<RowValues>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
            markers: Markers::Positional,
            equal: true,
            on_empty: OnEmpty::default(),
        }
    }

    /// Use `:<prefix><n>` markers instead of `?`.
    #[must_use]
    pub fn named(mut self, prefix: impl Into<String>) -> Self {
        self.markers = Markers::Named(prefix.into());
        self
    }

    /// Build `<>` / `NOT IN` instead.
    #[must_use]
    pub fn negated(mut self) -> Self {
        self.equal = false;
        self
    }

    #[must_use]
    pub fn on_empty(mut self, policy: OnEmpty) -> Self {
        self.on_empty = policy;
        self
    }

    /// Produce the fragment, numbering named markers from `start`.
    ///
    /// Returns the fragment and the next unused marker number.
    ///
    /// # Errors
    /// Returns `DmlError::InvalidUsage` for an empty item list under `OnEmpty::Reject`,
    /// and `DmlError::ParameterError` for a prefix that cannot form placeholder names.
    pub fn build(self, start: usize) -> Result<(InOrEqual, usize), DmlError> {
        if let Markers::Named(prefix) = &self.markers {
            check_prefix(prefix, start + self.items.len().max(1))?;
        }

        let mut items = self.items;
        if items.is_empty() {
            let keyword = match (&self.on_empty, self.equal) {
                (OnEmpty::Reject, _) => {
                    return Err(DmlError::InvalidUsage(
                        "empty item list for an IN / = comparison".to_string(),
                    ));
                }
                (OnEmpty::MatchNone, true) => "IN (NULL)",
                (OnEmpty::MatchNone, false) => "NOT IN (NULL)",
                (OnEmpty::IsNull, true) => "IS NULL",
                (OnEmpty::IsNull, false) => "IS NOT NULL",
                (OnEmpty::Value(v), _) => {
                    items.push(v.clone());
                    ""
                }
            };
            if !keyword.is_empty() {
                let params = empty_params(matches!(self.markers, Markers::Named(_)));
                return Ok((
                    InOrEqual {
                        sql: keyword.to_string(),
                        params,
                    },
                    start,
                ));
            }
        }

        let mut next = start;
        let mut markers = Vec::with_capacity(items.len());
        let mut names = Vec::new();
        for _ in &items {
            match &self.markers {
                Markers::Positional => markers.push("?".to_string()),
                Markers::Named(prefix) => {
                    let name = format!("{prefix}{next}");
                    markers.push(format!(":{name}"));
                    names.push(name);
                }
            }
            next += 1;
        }

        let sql = match (markers.len(), self.equal) {
            (1, true) => format!("= {}", markers[0]),
            (1, false) => format!("<> {}", markers[0]),
            (_, true) => format!("IN ({})", markers.join(",")),
            (_, false) => format!("NOT IN ({})", markers.join(",")),
        };
        let params = match self.markers {
            Markers::Positional => Params::Positional(items),
            Markers::Named(_) => Params::named(names.into_iter().zip(items)),
        };
        Ok((InOrEqual { sql, params }, next))
    }
}

fn empty_params(named: bool) -> Params {
    if named {
        Params::Named(std::collections::BTreeMap::new())
    } else {
        Params::none()
    }
}

fn check_prefix(prefix: &str, highest: usize) -> Result<(), DmlError> {
    let mut chars = prefix.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid || prefix.len() + highest.to_string().len() > MAX_PARAM_NAME_LEN {
        return Err(DmlError::ParameterError(format!(
            "'{prefix}' cannot prefix placeholder names"
        )));
    }
    Ok(())
}

/// Placeholder name for a condition field, unique among `taken`.
fn placeholder_name(field: &str, taken: &[String]) -> String {
    let mut base: String = field
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if !base.starts_with(|c: char| c.is_ascii_lowercase()) {
        base.insert(0, 'w');
    }
    base.truncate(MAX_PARAM_NAME_LEN - 4);

    let mut name = base.clone();
    let mut n = 1;
    while taken.contains(&name) {
        name = format!("{base}_{n}");
        n += 1;
    }
    name
}

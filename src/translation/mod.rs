//! Placeholder normalization.
//!
//! A statement may use exactly one of three placeholder styles: named (`:id`),
//! positional (`?`) or ordinal (`$1`). Drivers advertise the styles they accept as a
//! [`ParamStyles`] set and [`normalize_params`] rewrites the SQL and its parameters into
//! one of them.

use std::borrow::Cow;
use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::DmlError;
use crate::types::{ParamStyle, ParamStyles, Params, RowValues};

mod scanner;

use scanner::{Token, has_statement_separator, tokenize};

/// Longest accepted `:name`.
pub const MAX_PARAM_NAME_LEN: usize = 30;

lazy_static! {
    static ref TABLE_REF: Regex = Regex::new(r"\{([a-z][a-z0-9_]*)\}").expect("valid table regex");
}

/// A statement ready for a driver: SQL and parameters in one accepted style.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    pub sql: String,
    pub params: Params,
    pub style: ParamStyle,
}

impl NormalizedQuery {
    /// Parameters in bind order.
    #[must_use]
    pub fn values(&self) -> Vec<RowValues> {
        self.params.values()
    }
}

/// Replace `{table}` references with the prefixed physical name.
#[must_use]
pub fn fix_table_names<'a>(sql: &'a str, prefix: &str) -> Cow<'a, str> {
    TABLE_REF.replace_all(sql, |caps: &regex::Captures<'_>| format!("{prefix}{}", &caps[1]))
}

/// True when `sql` holds more than one statement.
#[must_use]
pub fn contains_multiple_statements(sql: &str) -> bool {
    has_statement_separator(sql)
}

/// Count placeholders of each style: `(named, positional, ordinal)`.
#[must_use]
pub fn count_placeholders(sql: &str) -> (usize, usize, usize) {
    count_tokens(&tokenize(sql))
}

fn count_tokens(tokens: &[Token<'_>]) -> (usize, usize, usize) {
    tokens.iter().fold((0, 0, 0), |(n, p, o), token| match token {
        Token::Named(_) => (n + 1, p, o),
        Token::Positional => (n, p + 1, o),
        Token::Ordinal(_) => (n, p, o + 1),
        Token::Text(_) => (n, p, o),
    })
}

/// Rewrite `sql` and `params` into a style contained in `allowed`.
///
/// The detected style is kept when the driver accepts it. Otherwise named input prefers
/// positional, then ordinal output; positional input prefers named, then ordinal; ordinal
/// input prefers positional, then named. Statements without placeholders pass through
/// with an empty parameter set in `allowed.preferred()` style.
///
/// # Errors
/// Returns `DmlError::ParameterError` when styles are mixed, a named parameter is missing,
/// unused or repeated, or fewer values than placeholders were supplied.
pub fn normalize_params(
    sql: &str,
    params: Params,
    allowed: ParamStyles,
) -> Result<NormalizedQuery, DmlError> {
    let tokens = tokenize(sql);
    let (named, positional, ordinal) = count_tokens(&tokens);

    let detected = match (named, positional, ordinal) {
        (0, 0, 0) => {
            let style = allowed.preferred();
            let params = match style {
                ParamStyle::Named => Params::Named(BTreeMap::new()),
                _ => Params::none(),
            };
            return Ok(NormalizedQuery {
                sql: sql.to_string(),
                params,
                style,
            });
        }
        (_, 0, 0) => ParamStyle::Named,
        (0, _, 0) => ParamStyle::Positional,
        (0, 0, _) => ParamStyle::Ordinal,
        _ => {
            return Err(DmlError::ParameterError(format!(
                "mixed placeholder styles in one statement ({named} named, {positional} positional, {ordinal} ordinal): {sql}"
            )));
        }
    };

    let params = cast_bools(params);
    match detected {
        ParamStyle::Named => from_named(sql, &tokens, params, allowed),
        ParamStyle::Positional => from_positional(sql, &tokens, params, allowed, positional),
        ParamStyle::Ordinal => from_ordinal(sql, &tokens, params, allowed),
    }
}

fn cast_bools(params: Params) -> Params {
    let cast = |v: RowValues| match v {
        RowValues::Bool(b) => RowValues::Int(i64::from(b)),
        other => other,
    };
    match params {
        Params::Named(map) => Params::Named(map.into_iter().map(|(k, v)| (k, cast(v))).collect()),
        Params::Positional(values) => Params::Positional(values.into_iter().map(cast).collect()),
    }
}

fn from_named(
    sql: &str,
    tokens: &[Token<'_>],
    params: Params,
    allowed: ParamStyles,
) -> Result<NormalizedQuery, DmlError> {
    let Params::Named(mut supplied) = params else {
        return Err(DmlError::ParameterError(format!(
            "named placeholders need named parameters: {sql}"
        )));
    };

    let mut ordered: Vec<(&str, RowValues)> = Vec::new();
    for token in tokens {
        let Token::Named(name) = *token else { continue };
        if name.len() > MAX_PARAM_NAME_LEN {
            return Err(DmlError::ParameterError(format!(
                "placeholder names must be {MAX_PARAM_NAME_LEN} characters or shorter, ':{name}' is too long"
            )));
        }
        if ordered.iter().any(|(seen, _)| *seen == name) {
            return Err(DmlError::ParameterError(format!(
                "duplicate parameter ':{name}' in statement: {sql}"
            )));
        }
        let value = supplied.remove(name).ok_or_else(|| {
            DmlError::ParameterError(format!("missing parameter ':{name}' for statement: {sql}"))
        })?;
        ordered.push((name, value));
    }

    if !supplied.is_empty() {
        let unused: Vec<&str> = supplied.keys().map(String::as_str).collect();
        return Err(DmlError::ParameterError(format!(
            "parameters not referenced by the statement: {}",
            unused.join(", ")
        )));
    }

    if allowed.contains(ParamStyle::Named) {
        return Ok(NormalizedQuery {
            sql: sql.to_string(),
            params: Params::Named(
                ordered
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            ),
            style: ParamStyle::Named,
        });
    }

    let style = if allowed.contains(ParamStyle::Positional) {
        ParamStyle::Positional
    } else {
        ParamStyle::Ordinal
    };
    let mut counter = 0usize;
    let rewritten = render(tokens, |_| {
        counter += 1;
        marker(style, counter)
    });
    Ok(NormalizedQuery {
        sql: rewritten,
        params: Params::Positional(ordered.into_iter().map(|(_, v)| v).collect()),
        style,
    })
}

fn from_positional(
    sql: &str,
    tokens: &[Token<'_>],
    params: Params,
    allowed: ParamStyles,
    count: usize,
) -> Result<NormalizedQuery, DmlError> {
    let Params::Positional(mut values) = params else {
        return Err(DmlError::ParameterError(format!(
            "positional placeholders need positional parameters: {sql}"
        )));
    };
    if count > values.len() {
        return Err(DmlError::ParameterError(format!(
            "statement expects {count} parameters, {} supplied: {sql}",
            values.len()
        )));
    }
    values.truncate(count);

    if allowed.contains(ParamStyle::Positional) {
        return Ok(NormalizedQuery {
            sql: sql.to_string(),
            params: Params::Positional(values),
            style: ParamStyle::Positional,
        });
    }

    if allowed.contains(ParamStyle::Named) {
        let mut counter = 0usize;
        let rewritten = render(tokens, |_| {
            counter += 1;
            marker(ParamStyle::Named, counter)
        });
        let map = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (format!("param{}", i + 1), v))
            .collect();
        return Ok(NormalizedQuery {
            sql: rewritten,
            params: Params::Named(map),
            style: ParamStyle::Named,
        });
    }

    let mut counter = 0usize;
    let rewritten = render(tokens, |_| {
        counter += 1;
        marker(ParamStyle::Ordinal, counter)
    });
    Ok(NormalizedQuery {
        sql: rewritten,
        params: Params::Positional(values),
        style: ParamStyle::Ordinal,
    })
}

fn from_ordinal(
    sql: &str,
    tokens: &[Token<'_>],
    params: Params,
    allowed: ParamStyles,
) -> Result<NormalizedQuery, DmlError> {
    let Params::Positional(mut values) = params else {
        return Err(DmlError::ParameterError(format!(
            "ordinal placeholders need positional parameters: {sql}"
        )));
    };
    let indexes: Vec<usize> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Ordinal(n) => Some(*n),
            _ => None,
        })
        .collect();
    let highest = indexes.iter().copied().max().unwrap_or(0);
    if highest > values.len() {
        return Err(DmlError::ParameterError(format!(
            "statement references ${highest}, {} parameters supplied: {sql}",
            values.len()
        )));
    }
    values.truncate(highest);

    if allowed.contains(ParamStyle::Ordinal) {
        return Ok(NormalizedQuery {
            sql: sql.to_string(),
            params: Params::Positional(values),
            style: ParamStyle::Ordinal,
        });
    }

    if allowed.contains(ParamStyle::Positional) {
        let rewritten = render(tokens, |_| "?".to_string());
        let reordered = indexes.iter().map(|n| values[n - 1].clone()).collect();
        return Ok(NormalizedQuery {
            sql: rewritten,
            params: Params::Positional(reordered),
            style: ParamStyle::Positional,
        });
    }

    let rewritten = render(tokens, |token| match token {
        Token::Ordinal(n) => marker(ParamStyle::Named, *n),
        _ => String::new(),
    });
    let map = indexes
        .iter()
        .map(|n| (format!("param{n}"), values[n - 1].clone()))
        .collect();
    Ok(NormalizedQuery {
        sql: rewritten,
        params: Params::Named(map),
        style: ParamStyle::Named,
    })
}

fn marker(style: ParamStyle, n: usize) -> String {
    match style {
        ParamStyle::Named => format!(":param{n}"),
        ParamStyle::Positional => "?".to_string(),
        ParamStyle::Ordinal => format!("${n}"),
    }
}

/// Reassemble tokens, replacing every placeholder with `replace(token)`.
fn render<F>(tokens: &[Token<'_>], mut replace: F) -> String
where
    F: FnMut(&Token<'_>) -> String,
{
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Text(text) => out.push_str(text),
            placeholder => {
                out.push_str(&replace(placeholder));
            }
        }
    }
    out
}

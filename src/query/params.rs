//! Request parameter extraction: body, path and query merged per attribute, plus list/sort/window options.

use crate::config::{Attribute, FieldType};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// Raw request inputs in precedence order: body over path over query.
#[derive(Clone, Copy, Debug)]
pub struct RequestParams<'a> {
    pub body: Option<&'a Map<String, Value>>,
    pub path: &'a HashMap<String, String>,
    pub query: &'a HashMap<String, String>,
}

impl<'a> RequestParams<'a> {
    pub fn new(
        body: Option<&'a Map<String, Value>>,
        path: &'a HashMap<String, String>,
        query: &'a HashMap<String, String>,
    ) -> Self {
        RequestParams { body, path, query }
    }

    /// Same path and query, different body (one bulk item).
    pub fn with_body(&self, body: &'a Map<String, Value>) -> Self {
        RequestParams {
            body: Some(body),
            path: self.path,
            query: self.query,
        }
    }

    pub fn query_str(&self, key: &str) -> Option<&'a str> {
        self.query.get(key).map(String::as_str).filter(|s| !s.is_empty())
    }
}

/// Value for every attribute present in the request. Empty query strings are unset; empty body/path
/// strings are kept. `children` attributes always resolve, to an empty array when absent.
pub fn compile_params(attributes: &[Attribute], req: &RequestParams<'_>) -> Map<String, Value> {
    let mut params = Map::new();
    for attr in attributes {
        let value = req
            .body
            .and_then(|b| b.get(&attr.name).cloned())
            .or_else(|| req.path.get(&attr.name).map(|s| coerce(&attr.field_type, s)))
            .or_else(|| {
                req.query
                    .get(&attr.name)
                    .filter(|s| !s.is_empty())
                    .map(|s| coerce(&attr.field_type, s))
            });
        match value {
            Some(v) => {
                params.insert(attr.name.clone(), v);
            }
            None if attr.field_type.is_children() => {
                params.insert(attr.name.clone(), Value::Array(Vec::new()));
            }
            None => {}
        }
    }
    params
}

/// Typed value for a string taken from the path or query string.
pub fn coerce(field_type: &FieldType, s: &str) -> Value {
    match field_type {
        FieldType::Number => parse_number(s).map(Value::Number).unwrap_or_else(|| Value::String(s.to_string())),
        FieldType::Boolean if s.eq_ignore_ascii_case("true") => Value::Bool(true),
        FieldType::Boolean if s.eq_ignore_ascii_case("false") => Value::Bool(false),
        FieldType::Date => Value::String(normalize_date(s)),
        _ => Value::String(s.to_string()),
    }
}

pub fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(Number::from(i));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Canonical UTC RFC 3339 with milliseconds when the input parses as a timestamp or a plain date.
pub fn normalize_date(s: &str) -> String {
    let trimmed = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true);
    }
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(dt) = d.and_hms_opt(0, 0, 0) {
            return dt.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true);
        }
    }
    s.to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// `orderBy=+name,-age`. A leading space is a URL-decoded `+`.
pub fn parse_order(order_by: &str) -> Vec<(String, SortOrder)> {
    order_by
        .split(',')
        .filter_map(|part| {
            let (order, key) = match part.chars().next()? {
                '-' => (SortOrder::Desc, &part[1..]),
                '+' | ' ' => (SortOrder::Asc, &part[1..]),
                _ => (SortOrder::Asc, part),
            };
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), order))
        })
        .collect()
}

/// Comma-separated names (`fields`, `expands`), empty segments dropped.
pub fn parse_list(s: Option<&str>) -> Vec<String> {
    s.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Largest accepted offset or limit. Stores address windows with signed 64-bit integers.
pub const MAX_WINDOW: u64 = i64::MAX as u64;

/// Requested collection window. Unparsable values fall back to the defaults; a zero limit is treated as unset.
/// Both values are capped at [`MAX_WINDOW`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

impl Window {
    pub fn from_query(query: &HashMap<String, String>, default_limit: u64) -> Self {
        let offset = query.get("offset").and_then(|s| s.trim().parse().ok()).unwrap_or(0);
        let limit = query
            .get("limit")
            .and_then(|s| s.trim().parse().ok())
            .filter(|n: &u64| *n > 0)
            .unwrap_or(default_limit);
        Window {
            offset: offset.min(MAX_WINDOW),
            limit: limit.min(MAX_WINDOW),
        }
    }
}

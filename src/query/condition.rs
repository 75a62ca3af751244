//! Query condition compiler: request parameters to store predicates with type-dependent semantics.

use crate::config::{Attribute, FieldType, ResourceSchema, SEARCH_FIELD};
use crate::error::StoreError;
use crate::query::params::{coerce, compile_params, normalize_date, parse_number, RequestParams};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Proximity search around a point. Segments are kept as given and parsed by the store at query time.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoNear {
    pub lat: String,
    pub lng: String,
    pub max_distance: String,
}

impl GeoNear {
    /// `"lat,lng,maxDistanceMeters"`.
    pub fn from_input(s: &str) -> Self {
        let segments: Vec<&str> = s.split(',').collect();
        let segment = |i: usize| segments.get(i).map(|s| s.trim().to_string()).unwrap_or_default();
        GeoNear {
            lat: segment(0),
            lng: segment(1),
            max_distance: segment(2),
        }
    }

    /// (lng, lat, max distance in meters).
    pub fn resolve(&self) -> Result<(f64, f64, f64), StoreError> {
        let parse = |name: &str, s: &str| {
            s.parse::<f64>()
                .map_err(|_| StoreError::InvalidQuery(format!("geo {} '{}' is not a number", name, s)))
        };
        Ok((
            parse("longitude", &self.lng)?,
            parse("latitude", &self.lat)?,
            parse("max distance", &self.max_distance)?,
        ))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Exact(Value),
    /// Regex source, matched against the string form of the field.
    Pattern(String),
    Range { gte: Value, lte: Value },
    In(Vec<Value>),
    Near(GeoNear),
}

/// Field → predicate, in insertion order. Fields are ANDed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Condition {
    predicates: Vec<(String, Predicate)>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: &str) -> Self {
        let mut c = Self::new();
        c.set("id", Predicate::Exact(Value::String(id.to_string())));
        c
    }

    pub fn set(&mut self, field: &str, predicate: Predicate) {
        match self.predicates.iter_mut().find(|(f, _)| f == field) {
            Some(slot) => slot.1 = predicate,
            None => self.predicates.push((field.to_string(), predicate)),
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Predicate> {
        let pos = self.predicates.iter().position(|(f, _)| f == field)?;
        Some(self.predicates.remove(pos).1)
    }

    pub fn get(&self, field: &str) -> Option<&Predicate> {
        self.predicates.iter().find(|(f, _)| f == field).map(|(_, p)| p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Predicate)> {
        self.predicates.iter().map(|(f, p)| (f.as_str(), p))
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn near(&self) -> Option<(&str, &GeoNear)> {
        self.iter().find_map(|(f, p)| match p {
            Predicate::Near(g) => Some((f, g)),
            _ => None,
        })
    }
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[(.+),(.+)\]$").expect("static regex"))
}

/// Attributes a condition may address: implicit `id`, declared ones, and the timestamps.
/// `children` attributes never become predicates.
fn condition_attributes(schema: &ResourceSchema) -> Vec<Attribute> {
    schema
        .all_attributes()
        .into_iter()
        .filter(|a| !a.field_type.is_children())
        .collect()
}

/// Compile a condition for `schema` from the request. `q` adds a free-text predicate on the search field.
pub fn compile_condition(schema: &ResourceSchema, req: &RequestParams<'_>) -> Condition {
    let attributes = condition_attributes(schema);
    let params = compile_params(&attributes, req);
    let mut condition = Condition::new();
    for attr in &attributes {
        if let Some(value) = params.get(&attr.name) {
            condition.set(&attr.name, compile_predicate(&attr.field_type, value));
        }
    }
    if let Some(q) = req.query_str("q") {
        condition.set(SEARCH_FIELD, Predicate::Pattern(regex::escape(q)));
    }
    condition
}

/// Predicate for one field value.
pub fn compile_predicate(field_type: &FieldType, value: &Value) -> Predicate {
    let Value::String(s) = value else {
        return Predicate::Exact(value.clone());
    };
    match field_type {
        FieldType::Geometry => return Predicate::Near(GeoNear::from_input(s)),
        FieldType::Number | FieldType::Date => {
            if let Some(caps) = range_re().captures(s) {
                return Predicate::Range {
                    gte: range_bound(field_type, caps[1].trim()),
                    lte: range_bound(field_type, caps[2].trim()),
                };
            }
        }
        _ => {}
    }
    if s.contains('*') {
        Predicate::Pattern(wildcard_pattern(s))
    } else if s.contains(',') {
        Predicate::In(s.split(',').map(|part| coerce(field_type, part)).collect())
    } else {
        Predicate::Exact(coerce(field_type, s))
    }
}

fn range_bound(field_type: &FieldType, s: &str) -> Value {
    match field_type {
        FieldType::Number => parse_number(s).map(Value::Number).unwrap_or_else(|| Value::String(s.to_string())),
        _ => Value::String(normalize_date(s)),
    }
}

/// Anchored regex where `*` stands for any sequence and everything else is literal.
pub fn wildcard_pattern(s: &str) -> String {
    let body = s.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
    format!("(?s)^{}$", body)
}

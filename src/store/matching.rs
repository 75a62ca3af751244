//! In-process predicate evaluation for stores that cannot push conditions down.

use crate::error::StoreError;
use crate::query::{Condition, Predicate};
use crate::store::Document;
use chrono::DateTime;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A condition prepared for evaluation against many documents. Patterns are compiled and geo
/// targets resolved once, up front.
pub struct Matcher<'c> {
    predicates: Vec<(&'c str, Compiled<'c>)>,
}

enum Compiled<'c> {
    Exact(&'c Value),
    Pattern(Regex),
    Range { gte: &'c Value, lte: &'c Value },
    In(&'c [Value]),
    Near { origin: (f64, f64), max_distance: f64 },
}

impl<'c> Matcher<'c> {
    /// Fails on an invalid pattern or geo query, even when no document is ever tested.
    pub fn new(condition: &'c Condition) -> Result<Self, StoreError> {
        let predicates = condition
            .iter()
            .map(|(field, predicate)| compile(predicate).map(|compiled| (field, compiled)))
            .collect::<Result<_, StoreError>>()?;
        Ok(Matcher { predicates })
    }

    /// Whether `document` satisfies every predicate.
    pub fn matches(&self, document: &Document) -> bool {
        self.predicates.iter().all(|(field, compiled)| {
            let value = document.get(*field).unwrap_or(&Value::Null);
            compiled.matches(value)
        })
    }
}

fn compile(predicate: &Predicate) -> Result<Compiled<'_>, StoreError> {
    Ok(match predicate {
        Predicate::Exact(expected) => Compiled::Exact(expected),
        Predicate::Pattern(source) => {
            Compiled::Pattern(Regex::new(source).map_err(|e| StoreError::InvalidQuery(e.to_string()))?)
        }
        Predicate::Range { gte, lte } => Compiled::Range { gte, lte },
        Predicate::In(set) => Compiled::In(set),
        Predicate::Near(near) => {
            let (lng, lat, max_distance) = near.resolve()?;
            Compiled::Near {
                origin: (lng, lat),
                max_distance,
            }
        }
    })
}

impl Compiled<'_> {
    fn matches(&self, value: &Value) -> bool {
        // Array fields match when any element does.
        if let Value::Array(items) = value {
            if !matches!(self, Compiled::Exact(Value::Array(_))) {
                return items.iter().any(|item| self.matches(item));
            }
        }
        match self {
            Compiled::Exact(expected) => values_equal(value, expected),
            Compiled::Pattern(re) => match value {
                Value::String(s) => re.is_match(s),
                Value::Number(n) => re.is_match(&n.to_string()),
                _ => false,
            },
            Compiled::Range { gte, lte } => {
                matches!(compare_values(value, gte), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare_values(value, lte), Some(Ordering::Less | Ordering::Equal))
            }
            Compiled::In(set) => set.iter().any(|candidate| values_equal(value, candidate)),
            Compiled::Near { origin, max_distance } => match point_of(value) {
                Some(point) => distance_meters(*origin, point) <= *max_distance,
                None => false,
            },
        }
    }
}

/// Whether `document` satisfies every predicate of `condition`. Compiles the condition on each call;
/// use a [`Matcher`] when testing many documents.
pub fn matches(document: &Document, condition: &Condition) -> Result<bool, StoreError> {
    Ok(Matcher::new(condition)?.matches(document))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between comparable values: numbers numerically, RFC 3339 timestamps chronologically,
/// other strings lexically. `None` when the kinds differ.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(dx), Ok(dy)) => Some(dx.cmp(&dy)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Total order used for sorting: null < bool < number < string < everything else.
pub(crate) fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    compare_values(a, b).unwrap_or_else(|| rank(a).cmp(&rank(b)))
}

/// `(lng, lat)` of a stored GeoJSON point or a bare coordinate pair.
pub(crate) fn point_of(value: &Value) -> Option<(f64, f64)> {
    let coordinates = match value {
        Value::Object(obj) => obj.get("coordinates")?,
        other => other,
    };
    let pair = coordinates.as_array()?;
    Some((pair.first()?.as_f64()?, pair.get(1)?.as_f64()?))
}

/// Great-circle distance in meters between two `(lng, lat)` points.
pub fn distance_meters(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lng1, lat1) = (a.0.to_radians(), a.1.to_radians());
    let (lng2, lat2) = (b.0.to_radians(), b.1.to_radians());
    let h = ((lat2 - lat1) / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * ((lng2 - lng1) / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::GeoNear;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn ranges_compare_numbers_and_timestamps() {
        let mut c = Condition::new();
        c.set("age", Predicate::Range { gte: json!(10), lte: json!(20) });
        assert!(matches(&doc(json!({ "age": 10.0 })), &c).unwrap());
        assert!(!matches(&doc(json!({ "age": 21 })), &c).unwrap());
        assert!(!matches(&doc(json!({ "age": "15" })), &c).unwrap());

        let mut c = Condition::new();
        c.set(
            "at",
            Predicate::Range {
                gte: json!("2024-01-01T00:00:00.000Z"),
                lte: json!("2024-01-31T00:00:00.000Z"),
            },
        );
        assert!(matches(&doc(json!({ "at": "2024-01-15T09:00:00+09:00" })), &c).unwrap());
        assert!(!matches(&doc(json!({ "at": "2024-02-01T00:00:00.000Z" })), &c).unwrap());
    }

    #[test]
    fn array_fields_match_any_element() {
        let mut c = Condition::new();
        c.set("tags", Predicate::In(vec![json!("b"), json!("z")]));
        assert!(matches(&doc(json!({ "tags": ["a", "b"] })), &c).unwrap());
        c.set("tags", Predicate::Exact(json!("q")));
        assert!(!matches(&doc(json!({ "tags": ["a", "b"] })), &c).unwrap());
    }

    #[test]
    fn near_uses_great_circle_distance() {
        let tokyo = json!({ "type": "Point", "coordinates": [139.6917, 35.6895] });
        let yokohama = json!({ "type": "Point", "coordinates": [139.6380, 35.4437] });
        let d = distance_meters(point_of(&tokyo).unwrap(), point_of(&yokohama).unwrap());
        assert!((27_000.0..29_000.0).contains(&d), "{}", d);

        let mut c = Condition::new();
        c.set("loc", Predicate::Near(GeoNear::from_input("35.6895,139.6917,30000")));
        assert!(matches(&doc(json!({ "loc": yokohama })), &c).unwrap());
        c.set("loc", Predicate::Near(GeoNear::from_input("35.6895,139.6917,1000")));
        assert!(!matches(&doc(json!({ "loc": yokohama })), &c).unwrap());
        c.set("loc", Predicate::Near(GeoNear::from_input("35.6895")));
        assert!(matches(&doc(json!({ "loc": yokohama })), &c).is_err());
    }

    #[test]
    fn one_matcher_serves_many_documents() {
        let mut c = Condition::new();
        c.set("name", Predicate::Pattern("(?s)^a.*$".into()));
        c.set("age", Predicate::In(vec![json!(1), json!(3)]));
        let matcher = Matcher::new(&c).unwrap();
        let docs = [
            doc(json!({ "name": "ann", "age": 1 })),
            doc(json!({ "name": "bob", "age": 1 })),
            doc(json!({ "name": "al", "age": 2 })),
            doc(json!({ "name": ["x", "amy"], "age": 3.0 })),
        ];
        let hits: Vec<bool> = docs.iter().map(|d| matcher.matches(d)).collect();
        assert_eq!(hits, [true, false, false, true]);

        let mut bad = Condition::new();
        bad.set("name", Predicate::Pattern("(".into()));
        assert!(matches!(Matcher::new(&bad), Err(StoreError::InvalidQuery(_))));
    }
}

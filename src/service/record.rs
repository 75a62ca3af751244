//! Write-side record construction: value normalization, the search field and server timestamps.

use crate::config::{FieldType, ResourceSchema, CREATED_AT_FIELD, ID_FIELD, SEARCH_FIELD, UPDATED_AT_FIELD};
use crate::query::{normalize_date, parse_number};
use crate::store::Document;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time, or `previous` when that is later, so `updatedAt` never moves backwards.
pub fn bump_timestamp(previous: Option<&Value>) -> String {
    let now = Utc::now();
    let previous = previous
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    match previous {
        Some(prev) if prev > now => prev.to_rfc3339_opts(SecondsFormat::Millis, true),
        _ => now.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

/// Storage form of a supplied value.
pub fn normalize_value(field_type: &FieldType, value: &Value) -> Value {
    match (field_type, value) {
        (FieldType::Date, Value::String(s)) => Value::String(normalize_date(s)),
        (FieldType::Geometry, v) => geometry_point(v).unwrap_or_else(|| v.clone()),
        _ => value.clone(),
    }
}

/// GeoJSON point from `{type: Point, coordinates}`, `[lng, lat]` or `"lat,lng"`.
pub fn geometry_point(value: &Value) -> Option<Value> {
    let (lng, lat) = match value {
        Value::Object(obj) if obj.get("type").and_then(Value::as_str) == Some("Point") => {
            return Some(value.clone());
        }
        Value::Array(pair) if pair.len() == 2 => (pair[0].as_f64()?, pair[1].as_f64()?),
        Value::String(s) => {
            let (lat, lng) = s.split_once(',')?;
            (parse_number(lng)?.as_f64()?, parse_number(lat)?.as_f64()?)
        }
        _ => return None,
    };
    Some(json!({ "type": "Point", "coordinates": [lng, lat] }))
}

/// Text attributes joined with spaces, the haystack for `q` searches.
pub fn search_text(schema: &ResourceSchema, record: &Map<String, Value>) -> String {
    schema
        .text_fields()
        .into_iter()
        .filter_map(|f| match record.get(f) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Full record for a new instance. Absent attributes take their default or null;
/// `children` attributes start as an empty array that the children's creation appends to.
pub fn new_record(schema: &ResourceSchema, params: &Map<String, Value>, id: &str) -> Document {
    let now = now_timestamp();
    let mut record = Document::new();
    record.insert(ID_FIELD.into(), Value::String(id.to_string()));
    for attr in &schema.attributes {
        let value = if attr.field_type.is_children() {
            Value::Array(Vec::new())
        } else {
            match params.get(&attr.name) {
                Some(v) => normalize_value(&attr.field_type, v),
                None => attr.default.clone().unwrap_or(Value::Null),
            }
        };
        record.insert(attr.name.clone(), value);
    }
    record.insert(CREATED_AT_FIELD.into(), Value::String(now.clone()));
    record.insert(UPDATED_AT_FIELD.into(), Value::String(now));
    let text = search_text(schema, &record);
    record.insert(SEARCH_FIELD.into(), Value::String(text));
    record
}

/// Partial-merge patch: only supplied, storable attributes, normalized.
pub fn update_patch(schema: &ResourceSchema, params: &Map<String, Value>) -> Document {
    schema
        .attributes
        .iter()
        .filter(|a| !a.field_type.is_children())
        .filter_map(|a| params.get(&a.name).map(|v| (a.name.clone(), normalize_value(&a.field_type, v))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, Registry, SchemaConfig};

    fn registry() -> Registry {
        resolve(
            &SchemaConfig::from_value(json!({
                "city": {
                    "name": { "unique": true, "text": true },
                    "note": { "text": true },
                    "founded": { "type": "date" },
                    "location": { "type": "geometry" },
                    "rank": { "type": "number", "default": 0 },
                    "districts": { "type": "children", "relation": "district" }
                },
                "district": {
                    "city": { "type": "parent", "relation": "city.districts" }
                }
            }))
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn geometry_inputs_become_points() {
        let expected = json!({ "type": "Point", "coordinates": [139.7, 35.6] });
        assert_eq!(geometry_point(&json!([139.7, 35.6])), Some(expected.clone()));
        assert_eq!(geometry_point(&json!("35.6, 139.7")), Some(expected.clone()));
        assert_eq!(geometry_point(&expected), Some(expected.clone()));
        assert_eq!(geometry_point(&json!("nowhere")), None);
    }

    #[test]
    fn new_record_fills_defaults_nulls_and_bookkeeping() {
        let registry = registry();
        let schema = registry.get("city").unwrap();
        let params = json!({ "name": "Tokyo", "founded": "1457-01-01", "location": "35.6,139.7", "districts": [] });
        let record = new_record(schema, params.as_object().unwrap(), "tokyo");
        assert_eq!(record["id"], "tokyo");
        assert_eq!(record["note"], Value::Null);
        assert_eq!(record["rank"], 0);
        assert_eq!(record["districts"], json!([]));
        assert_eq!(record["founded"], "1457-01-01T00:00:00.000Z");
        assert_eq!(record["location"]["coordinates"], json!([139.7, 35.6]));
        assert_eq!(record["_q"], "Tokyo");
        assert_eq!(record["createdAt"], record["updatedAt"]);
    }

    #[test]
    fn patch_skips_children_and_absent_fields() {
        let registry = registry();
        let schema = registry.get("city").unwrap();
        let params = json!({ "note": "capital", "districts": [] });
        let patch = update_patch(schema, params.as_object().unwrap());
        assert_eq!(Value::Object(patch), json!({ "note": "capital" }));
    }

    #[test]
    fn updated_at_never_moves_backwards() {
        let future = json!("2999-01-01T00:00:00.000Z");
        assert_eq!(bump_timestamp(Some(&future)), "2999-01-01T00:00:00.000Z");
        let past = json!("2000-01-01T00:00:00.000Z");
        assert!(bump_timestamp(Some(&past)).as_str() > "2000-01-01T00:00:00.000Z");
    }
}

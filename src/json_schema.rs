//! JSON Schema description of a resource's representation, served in schema-introspection mode.

use crate::config::{Attribute, FieldType, Relation, ResourceSchema};
use serde_json::{json, Map, Value};

fn link_schema(with_id: bool) -> Value {
    let mut properties = Map::new();
    properties.insert("href".into(), json!({ "type": ["string", "null"] }));
    if with_id {
        properties.insert("id".into(), json!({ "type": ["string", "null"] }));
    }
    json!({ "type": "object", "properties": properties })
}

fn property(attr: &Attribute) -> Value {
    let mut prop = match &attr.field_type {
        FieldType::String => json!({ "type": "string" }),
        FieldType::Number => json!({ "type": "number" }),
        FieldType::Boolean => json!({ "type": "boolean" }),
        FieldType::Date => json!({ "type": "string", "format": "date-time" }),
        FieldType::Geometry => json!({
            "type": "array",
            "items": { "type": "number" },
            "minItems": 2,
            "maxItems": 2
        }),
        FieldType::Relation(Relation::Children { .. }) => link_schema(false),
        FieldType::Relation(_) => link_schema(true),
    };
    if let Some(obj) = prop.as_object_mut() {
        if let Some(desc) = &attr.desc {
            obj.insert("description".into(), Value::String(desc.clone()));
        }
        if let Some(default) = &attr.default {
            obj.insert("default".into(), default.clone());
        }
        if let Some(pattern) = &attr.rules.pattern {
            obj.insert("pattern".into(), Value::String(pattern.clone()));
        }
        if let Some(allowed) = &attr.rules.allowed {
            obj.insert("enum".into(), Value::Array(allowed.clone()));
        }
    }
    prop
}

/// Draft-04 schema for one instance of `schema`, including the implicit fields.
pub fn describe(prefix: &str, schema: &ResourceSchema) -> Value {
    let properties: Map<String, Value> = schema
        .all_attributes()
        .iter()
        .map(|a| (a.name.clone(), property(a)))
        .collect();
    let required: Vec<&str> = schema
        .attributes
        .iter()
        .filter(|a| a.required)
        .map(|a| a.name.as_str())
        .collect();
    json!({
        "$schema": "http://json-schema.org/draft-04/schema#",
        "id": format!("{}/{}", prefix, schema.plural),
        "title": schema.name,
        "type": "object",
        "properties": properties,
        "required": required
    })
}

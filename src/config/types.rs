//! Raw schema declarations as written in the schema JSON document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declared attribute type. Relation-typed attributes (`children`, `parent`, `instance`) need a `relation`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeTypeConfig {
    #[default]
    String,
    Number,
    Boolean,
    Date,
    Geometry,
    Children,
    Parent,
    Instance,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AttributeConfig {
    #[serde(rename = "type", default)]
    pub type_: AttributeTypeConfig,
    /// `children`/`instance`: target resource name. `parent`: `"owner.childField"`.
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, alias = "uniq")]
    pub unique: bool,
    /// Value is concatenated into the free-text search field at write time.
    #[serde(default)]
    pub text: bool,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(flatten)]
    pub rules: ValidationRule,
}

/// Field-level validation rules consumed by the default validator.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub pattern: Option<String>,
    /// Message reported instead of `Invalid value[..]`.
    #[serde(default)]
    pub invalid: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

/// Resource name → (attribute name → attribute). Key order follows the document.
#[derive(Clone, Debug, Default)]
pub struct SchemaConfig {
    pub resources: Vec<(String, Vec<(String, AttributeConfig)>)>,
}

impl SchemaConfig {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let Value::Object(resources) = value else {
            return Err(serde::de::Error::custom("schema document must be an object of resources"));
        };
        let mut out = Vec::with_capacity(resources.len());
        for (name, attrs) in resources {
            out.push((name, attributes_from_value(attrs)?));
        }
        Ok(SchemaConfig { resources: out })
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        Self::from_value(serde_json::from_str(s)?)
    }
}

fn attributes_from_value(value: Value) -> Result<Vec<(String, AttributeConfig)>, serde_json::Error> {
    let attrs: Map<String, Value> = match value {
        Value::Object(m) => m,
        _ => return Err(serde::de::Error::custom("resource must be an object of attributes")),
    };
    attrs
        .into_iter()
        .map(|(name, attr)| Ok((name, serde_json::from_value(attr)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_declaration_order_and_uniq_alias() {
        let config = SchemaConfig::from_value(json!({
            "group": {
                "name": { "uniq": true, "text": true },
                "members": { "type": "children", "relation": "person" }
            },
            "person": {
                "group": { "type": "parent", "relation": "group.members" },
                "age": { "type": "number", "minimum": 0 }
            }
        }))
        .unwrap();

        let names: Vec<_> = config.resources.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["group", "person"]);
        let (_, group) = &config.resources[0];
        assert_eq!(group[0].0, "name");
        assert!(group[0].1.unique);
        assert_eq!(group[1].1.type_, AttributeTypeConfig::Children);
        let (_, person) = &config.resources[1];
        assert_eq!(person[1].1.rules.minimum, Some(0.0));
    }

    #[test]
    fn rejects_non_object_resource() {
        assert!(SchemaConfig::from_value(json!({ "group": [] })).is_err());
    }
}

//! Field validation: the pluggable validation predicate and the default rule-based implementation.

use crate::config::{Attribute, FieldType, ResourceSchema, ValidationRule};
use crate::error::{AppError, FieldErrors};
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// Outcome of validation: `{"ok": true}` or one message per failing field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: FieldErrors,
}

impl ValidationReport {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.ok() {
            Ok(())
        } else {
            Err(AppError::ValidationFailed(self.errors))
        }
    }
}

impl Serialize for ValidationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.ok() {
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry("ok", &true)?;
            map.end()
        } else {
            self.errors.serialize(serializer)
        }
    }
}

/// `validate(schema, params, partial)`. Partial validation checks only the supplied fields.
pub trait Validator: Send + Sync {
    fn validate(&self, schema: &ResourceSchema, params: &Map<String, Value>, partial: bool) -> ValidationReport;
}

/// Validates against the rules declared on each attribute.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleValidator;

impl Validator for RuleValidator {
    fn validate(&self, schema: &ResourceSchema, params: &Map<String, Value>, partial: bool) -> ValidationReport {
        let mut report = ValidationReport::default();
        for attr in &schema.attributes {
            let value = params.get(&attr.name);
            let failed = match value {
                None | Some(Value::Null) => !partial && attr.required && attr.default.is_none(),
                Some(v) => !value_is_valid(attr, v),
            };
            if failed {
                report.errors.insert(attr.name.clone(), message(attr, value));
            }
        }
        report
    }
}

fn message(attr: &Attribute, value: Option<&Value>) -> String {
    if let Some(custom) = &attr.rules.invalid {
        return custom.clone();
    }
    let shown = match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    format!("Invalid value[{}]", shown)
}

fn value_is_valid(attr: &Attribute, v: &Value) -> bool {
    let type_ok = match attr.field_type {
        FieldType::Number => v.is_number(),
        FieldType::Boolean => v.is_boolean(),
        _ => true,
    };
    type_ok && rules_hold(&attr.rules, v)
}

fn rules_hold(rule: &ValidationRule, v: &Value) -> bool {
    let text = match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    };
    if let (Some(pattern), Some(text)) = (&rule.pattern, &text) {
        match Regex::new(pattern) {
            Ok(re) if re.is_match(text) => {}
            _ => return false,
        }
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if rule.max_length.is_some_and(|max| len > max as usize) || rule.min_length.is_some_and(|min| len < min as usize) {
            return false;
        }
    }
    if let Some(n) = v.as_f64() {
        if rule.minimum.is_some_and(|min| n < min) || rule.maximum.is_some_and(|max| n > max) {
            return false;
        }
    }
    if let Some(allowed) = &rule.allowed {
        let found = allowed.iter().any(|a| match (a, v) {
            (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
            _ => a == v,
        });
        if !found {
            return false;
        }
    }
    true
}

/// Unique fields derive the id, so updates may not touch them.
pub fn check_unique_unchanged(schema: &ResourceSchema, params: &Map<String, Value>) -> ValidationReport {
    let mut report = ValidationReport::default();
    for field in schema.unique_fields() {
        if params.contains_key(field) {
            report.errors.insert(field.to_string(), "unique field could not be changed".into());
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, Registry, SchemaConfig};
    use serde_json::json;

    fn registry() -> Registry {
        resolve(
            &SchemaConfig::from_value(json!({
                "item": {
                    "number": { "pattern": "^\\d+$" },
                    "code": { "required": true, "invalid": "Code is required", "unique": true },
                    "size": { "type": "number", "minimum": 1, "maximum": 10 },
                    "color": { "allowed": ["red", "blue"], "max_length": 4 }
                }
            }))
            .unwrap(),
        )
        .unwrap()
    }

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn reports_invalid_values_with_default_or_custom_message() {
        let registry = registry();
        let schema = registry.get("item").unwrap();
        let report = RuleValidator.validate(schema, &params(json!({ "number": "a", "code": null })), false);
        assert!(!report.ok());
        assert_eq!(report.errors["number"], "Invalid value[a]");
        assert_eq!(report.errors["code"], "Code is required");
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({ "number": "Invalid value[a]", "code": "Code is required" })
        );
    }

    #[test]
    fn accepts_valid_values() {
        let registry = registry();
        let schema = registry.get("item").unwrap();
        let report = RuleValidator.validate(schema, &params(json!({ "number": 1, "code": "x", "size": 3, "color": "red" })), false);
        assert!(report.ok());
        assert_eq!(serde_json::to_value(&report).unwrap(), json!({ "ok": true }));
    }

    #[test]
    fn range_length_allowed_and_type() {
        let registry = registry();
        let schema = registry.get("item").unwrap();
        let report = RuleValidator.validate(schema, &params(json!({ "size": 11, "color": "green", "code": "x" })), false);
        assert_eq!(report.errors.keys().collect::<Vec<_>>(), ["color", "size"]);
        let report = RuleValidator.validate(schema, &params(json!({ "size": "3" })), true);
        assert_eq!(report.errors["size"], "Invalid value[3]");
    }

    #[test]
    fn partial_skips_required() {
        let registry = registry();
        let schema = registry.get("item").unwrap();
        assert!(RuleValidator.validate(schema, &Map::new(), true).ok());
        assert!(!RuleValidator.validate(schema, &Map::new(), false).ok());
    }

    #[test]
    fn unique_fields_are_immutable() {
        let registry = registry();
        let schema = registry.get("item").unwrap();
        let report = check_unique_unchanged(schema, &params(json!({ "code": "y", "size": 2 })));
        assert_eq!(report.errors["code"], "unique field could not be changed");
        assert_eq!(report.errors.len(), 1);
    }
}

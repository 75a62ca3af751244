//! Load schema declarations from JSON and resolve them into the registry.

use crate::case::pluralize;
use crate::config::resolved::{Attribute, FieldType, Registry, Relation, ResourceSchema};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Build the registry from declarations (validates first).
pub fn resolve(config: &SchemaConfig) -> Result<Registry, ConfigError> {
    validate(config)?;

    let mut resources = Vec::with_capacity(config.resources.len());
    let mut by_name = HashMap::new();
    let mut by_plural = HashMap::new();

    for (name, attrs) in &config.resources {
        let attributes = attrs
            .iter()
            .map(|(attr_name, attr)| resolve_attribute(attr_name, attr))
            .collect::<Result<Vec<_>, _>>()?;
        let plural = pluralize(name);
        by_name.insert(name.clone(), resources.len());
        by_plural.insert(plural.clone(), resources.len());
        resources.push(ResourceSchema {
            name: name.clone(),
            plural,
            attributes,
        });
    }

    tracing::debug!(resources = resources.len(), "schema registry resolved");
    Ok(Registry {
        resources,
        by_name,
        by_plural,
    })
}

fn resolve_attribute(name: &str, attr: &AttributeConfig) -> Result<Attribute, ConfigError> {
    let relation = || attr.relation.clone().unwrap_or_default();
    let field_type = match attr.type_ {
        AttributeTypeConfig::String => FieldType::String,
        AttributeTypeConfig::Number => FieldType::Number,
        AttributeTypeConfig::Boolean => FieldType::Boolean,
        AttributeTypeConfig::Date => FieldType::Date,
        AttributeTypeConfig::Geometry => FieldType::Geometry,
        AttributeTypeConfig::Children => FieldType::Relation(Relation::Children { resource: relation() }),
        AttributeTypeConfig::Instance => FieldType::Relation(Relation::Instance { resource: relation() }),
        AttributeTypeConfig::Parent => {
            let rel = relation();
            let (owner, field) = rel.split_once('.').ok_or_else(|| ConfigError::InvalidRelation {
                resource: String::new(),
                attribute: name.to_string(),
                relation: rel.clone(),
            })?;
            FieldType::Relation(Relation::Parent {
                owner: owner.to_string(),
                field: field.to_string(),
            })
        }
    };
    Ok(Attribute {
        name: name.to_string(),
        field_type,
        default: attr.default.clone(),
        required: attr.required,
        unique: attr.unique,
        text: attr.text,
        desc: attr.desc.clone(),
        rules: attr.rules.clone(),
    })
}

/// Read a schema JSON document from disk.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<SchemaConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    SchemaConfig::from_json_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

//! Schema validation: relation targets and naming consistency.

use crate::case::pluralize;
use crate::config::{AttributeTypeConfig, SchemaConfig, CREATED_AT_FIELD, ID_FIELD, SEARCH_FIELD, UPDATED_AT_FIELD};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

const RESERVED: &[&str] = &[ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD, SEARCH_FIELD];

pub fn validate(config: &SchemaConfig) -> Result<(), ConfigError> {
    if config.resources.is_empty() {
        return Err(ConfigError::Validation("at least one resource required".into()));
    }

    let names: HashSet<&str> = config.resources.iter().map(|(n, _)| n.as_str()).collect();
    let attrs_by_resource: HashMap<&str, HashMap<&str, AttributeTypeConfig>> = config
        .resources
        .iter()
        .map(|(n, attrs)| (n.as_str(), attrs.iter().map(|(a, c)| (a.as_str(), c.type_)).collect()))
        .collect();

    let mut plurals = HashSet::new();
    for (name, attrs) in &config.resources {
        if name.is_empty() || name.contains('/') {
            return Err(ConfigError::Validation(format!("invalid resource name '{}'", name)));
        }
        if !plurals.insert(pluralize(name)) {
            return Err(ConfigError::DuplicatePathSegment(pluralize(name)));
        }

        for (attr_name, attr) in attrs {
            if RESERVED.contains(&attr_name.as_str()) {
                return Err(ConfigError::ReservedAttribute {
                    resource: name.clone(),
                    attribute: attr_name.clone(),
                });
            }
            let relation = attr.relation.as_deref();
            match attr.type_ {
                AttributeTypeConfig::Children | AttributeTypeConfig::Instance => {
                    let target = relation.ok_or_else(|| missing_relation(name, attr_name))?;
                    if !names.contains(target) {
                        return Err(ConfigError::MissingReference {
                            kind: "resource",
                            id: target.to_string(),
                        });
                    }
                }
                AttributeTypeConfig::Parent => {
                    let relation = relation.ok_or_else(|| missing_relation(name, attr_name))?;
                    let (owner, field) = relation.split_once('.').ok_or_else(|| ConfigError::InvalidRelation {
                        resource: name.clone(),
                        attribute: attr_name.clone(),
                        relation: relation.to_string(),
                    })?;
                    let owner_attrs = attrs_by_resource.get(owner).ok_or_else(|| ConfigError::MissingReference {
                        kind: "resource",
                        id: owner.to_string(),
                    })?;
                    if owner_attrs.get(field) != Some(&AttributeTypeConfig::Children) {
                        return Err(ConfigError::InvalidRelation {
                            resource: name.clone(),
                            attribute: attr_name.clone(),
                            relation: relation.to_string(),
                        });
                    }
                }
                _ => {}
            }
        }
    }
    Ok(())
}

fn missing_relation(resource: &str, attribute: &str) -> ConfigError {
    ConfigError::InvalidRelation {
        resource: resource.to_string(),
        attribute: attribute.to_string(),
        relation: String::new(),
    }
}

//! Resolved schema registry: declarations validated and flattened for runtime use.

use crate::config::ValidationRule;
use serde_json::Value;
use std::collections::HashMap;

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";
/// Stored-only field holding the concatenated `text` attribute values.
pub const SEARCH_FIELD: &str = "_q";

/// Relation kinds. Each variant names the resource it points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Relation {
    /// Paginated sub-collection of `resource`, always rendered as a link.
    Children { resource: String },
    /// Reference to the owning `owner` instance whose `field` array tracks this child.
    Parent { owner: String, field: String },
    /// Single reference to an instance of `resource`.
    Instance { resource: String },
}

impl Relation {
    /// Resource whose store is consulted when the relation is followed.
    pub fn target(&self) -> &str {
        match self {
            Relation::Children { resource } | Relation::Instance { resource } => resource,
            Relation::Parent { owner, .. } => owner,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Geometry,
    Relation(Relation),
}

impl FieldType {
    pub fn relation(&self) -> Option<&Relation> {
        match self {
            FieldType::Relation(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_children(&self) -> bool {
        matches!(self, FieldType::Relation(Relation::Children { .. }))
    }
}

#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub field_type: FieldType,
    pub default: Option<Value>,
    pub required: bool,
    pub unique: bool,
    pub text: bool,
    pub desc: Option<String>,
    pub rules: ValidationRule,
}

impl Attribute {
    pub fn implicit(name: &str, field_type: FieldType) -> Self {
        Attribute {
            name: name.to_string(),
            field_type,
            default: None,
            required: false,
            unique: false,
            text: false,
            desc: None,
            rules: ValidationRule::default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResourceSchema {
    pub name: String,
    /// Path segment of the collection (`person` → `people`).
    pub plural: String,
    /// Declared attributes in declaration order, without the implicit ones.
    pub attributes: Vec<Attribute>,
}

impl ResourceSchema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn unique_fields(&self) -> Vec<&str> {
        self.attributes.iter().filter(|a| a.unique).map(|a| a.name.as_str()).collect()
    }

    pub fn text_fields(&self) -> Vec<&str> {
        self.attributes.iter().filter(|a| a.text).map(|a| a.name.as_str()).collect()
    }

    pub fn relations(&self) -> impl Iterator<Item = (&Attribute, &Relation)> {
        self.attributes
            .iter()
            .filter_map(|a| a.field_type.relation().map(|r| (a, r)))
    }

    /// Attribute whose `parent` relation points at `owner.field`.
    pub fn parent_attribute_for(&self, owner: &str, field: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| {
            matches!(&a.field_type, FieldType::Relation(Relation::Parent { owner: o, field: f }) if o == owner && f == field)
        })
    }

    /// Declared attributes plus implicit `id`, `createdAt`, `updatedAt`.
    pub fn all_attributes(&self) -> Vec<Attribute> {
        let mut out = Vec::with_capacity(self.attributes.len() + 3);
        out.push(Attribute::implicit(ID_FIELD, FieldType::String));
        out.extend(self.attributes.iter().cloned());
        out.push(Attribute::implicit(CREATED_AT_FIELD, FieldType::Date));
        out.push(Attribute::implicit(UPDATED_AT_FIELD, FieldType::Date));
        out
    }

    /// Field names returned by a read when no projection is requested.
    pub fn field_names(&self) -> Vec<String> {
        self.all_attributes().into_iter().map(|a| a.name).collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Registry {
    pub resources: Vec<ResourceSchema>,
    pub by_name: HashMap<String, usize>,
    pub by_plural: HashMap<String, usize>,
}

impl Registry {
    pub fn get(&self, name: &str) -> Option<&ResourceSchema> {
        self.by_name.get(name).map(|&i| &self.resources[i])
    }

    pub fn by_path(&self, plural: &str) -> Option<&ResourceSchema> {
        self.by_plural.get(plural).map(|&i| &self.resources[i])
    }
}

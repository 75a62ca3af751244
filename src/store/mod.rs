//! Document store contract consumed by the generated operations, plus in-memory and PostgreSQL implementations.

mod matching;
pub mod memory;
pub mod postgres;

pub use matching::{compare_values, distance_meters, matches, Matcher};
pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgDocumentStore};

use crate::config::SEARCH_FIELD;
use crate::error::StoreError;
use crate::query::{Condition, SortOrder};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One stored record: flat key/value document keyed by its `id` field.
pub type Document = Map<String, Value>;

#[derive(Clone, Debug, Default)]
pub struct FindOptions {
    /// Projection. `None` returns every stored field.
    pub fields: Option<Vec<String>>,
    pub skip: u64,
    pub limit: Option<u64>,
    pub sort: Vec<(String, SortOrder)>,
}

/// Narrow store contract: find / count / findOne / findOneAndUpdate / findOneAndRemove / save / remove.
/// Collections are addressed by resource name. Single-document writes are atomic; nothing else is.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        collection: &str,
        condition: &Condition,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str, condition: &Condition) -> Result<u64, StoreError>;

    async fn find_one(
        &self,
        collection: &str,
        condition: &Condition,
        fields: Option<&[String]>,
    ) -> Result<Option<Document>, StoreError>;

    /// Merge `patch` into the first match. Returns the updated document.
    async fn find_one_and_update(
        &self,
        collection: &str,
        condition: &Condition,
        patch: &Document,
    ) -> Result<Option<Document>, StoreError>;

    /// Returns the removed document.
    async fn find_one_and_remove(&self, collection: &str, condition: &Condition) -> Result<Option<Document>, StoreError>;

    /// Insert, or replace the document with the same `id`.
    async fn save(&self, collection: &str, document: Document) -> Result<(), StoreError>;

    async fn remove(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

pub fn document_id(document: &Document) -> Result<&str, StoreError> {
    document
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::InvalidQuery("document has no string id".into()))
}

/// Keep only the projected fields.
pub fn project(document: Document, fields: Option<&[String]>) -> Document {
    match fields {
        None => document,
        Some(fields) => document
            .into_iter()
            .filter(|(k, _)| fields.iter().any(|f| f == k))
            .collect(),
    }
}

/// Plain key/value form handed to the relation resolver: internal fields dropped,
/// GeoJSON points flattened to their coordinate pair.
pub fn materialize(mut document: Document) -> Document {
    document.remove(SEARCH_FIELD);
    for value in document.values_mut() {
        if let Some(coordinates) = point_coordinates(value) {
            *value = coordinates;
        }
    }
    document
}

fn point_coordinates(value: &Value) -> Option<Value> {
    let obj = value.as_object()?;
    if obj.get("type").and_then(Value::as_str) != Some("Point") {
        return None;
    }
    obj.get("coordinates").cloned()
}

//! In-memory document store for tests and development.

use crate::error::StoreError;
use crate::query::{Condition, SortOrder};
use crate::store::matching::{distance_meters, point_of, sort_cmp};
use crate::store::{document_id, project, Document, DocumentStore, FindOptions, Matcher};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Collections kept in insertion order. Uses RwLock for thread-safe access.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Vec<Document>>>, StoreError> {
        self.collections
            .read()
            .map_err(|e| StoreError::Unavailable(format!("failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Vec<Document>>>, StoreError> {
        self.collections
            .write()
            .map_err(|e| StoreError::Unavailable(format!("failed to acquire write lock: {}", e)))
    }

    fn matching(&self, collection: &str, condition: &Condition) -> Result<Vec<Document>, StoreError> {
        let matcher = Matcher::new(condition)?;
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .into_iter()
            .flatten()
            .filter(|doc| matcher.matches(doc))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(
        &self,
        collection: &str,
        condition: &Condition,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        tracing::debug!(collection, condition = ?condition, options = ?options, "find");
        let mut docs = self.matching(collection, condition)?;

        if !options.sort.is_empty() {
            docs.sort_by(|a, b| {
                for (field, order) in &options.sort {
                    let null = serde_json::Value::Null;
                    let ord = sort_cmp(a.get(field).unwrap_or(&null), b.get(field).unwrap_or(&null));
                    let ord = if *order == SortOrder::Desc { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        } else if let Some((field, near)) = condition.near() {
            // Nearest first, as a geo index would return them.
            let (lng, lat, _) = near.resolve()?;
            let distance = |d: &Document| {
                d.get(field)
                    .and_then(point_of)
                    .map(|p| distance_meters((lng, lat), p))
                    .unwrap_or(f64::MAX)
            };
            docs.sort_by(|a, b| distance(a).partial_cmp(&distance(b)).unwrap_or(Ordering::Equal));
        }

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        Ok(docs
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|d| project(d, options.fields.as_deref()))
            .collect())
    }

    async fn count(&self, collection: &str, condition: &Condition) -> Result<u64, StoreError> {
        tracing::debug!(collection, condition = ?condition, "count");
        Ok(self.matching(collection, condition)?.len() as u64)
    }

    async fn find_one(
        &self,
        collection: &str,
        condition: &Condition,
        fields: Option<&[String]>,
    ) -> Result<Option<Document>, StoreError> {
        tracing::debug!(collection, condition = ?condition, "find_one");
        let matcher = Matcher::new(condition)?;
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .into_iter()
            .flatten()
            .find(|doc| matcher.matches(doc))
            .map(|doc| project(doc.clone(), fields)))
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        condition: &Condition,
        patch: &Document,
    ) -> Result<Option<Document>, StoreError> {
        tracing::debug!(collection, condition = ?condition, "find_one_and_update");
        let matcher = Matcher::new(condition)?;
        let mut collections = self.write()?;
        let Some(doc) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| matcher.matches(doc)))
        else {
            return Ok(None);
        };
        for (k, v) in patch {
            doc.insert(k.clone(), v.clone());
        }
        Ok(Some(doc.clone()))
    }

    async fn find_one_and_remove(&self, collection: &str, condition: &Condition) -> Result<Option<Document>, StoreError> {
        tracing::debug!(collection, condition = ?condition, "find_one_and_remove");
        let matcher = Matcher::new(condition)?;
        let mut collections = self.write()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(None);
        };
        Ok(docs.iter().position(|doc| matcher.matches(doc)).map(|i| docs.remove(i)))
    }

    async fn save(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        let id = document_id(&document)?.to_string();
        tracing::debug!(collection, id = %id, "save");
        let mut collections = self.write()?;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.get("id").and_then(|v| v.as_str()) == Some(id.as_str())) {
            Some(existing) => *existing = document,
            None => docs.push(document),
        }
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        tracing::debug!(collection, id, "remove");
        let mut collections = self.write()?;
        if let Some(docs) = collections.get_mut(collection) {
            docs.retain(|d| d.get("id").and_then(|v| v.as_str()) != Some(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{GeoNear, Predicate};
    use serde_json::{json, Value};

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, age) in [("a", 30), ("b", 10), ("c", 20)] {
            store.save("person", doc(json!({ "id": id, "age": age }))).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn find_sorts_skips_and_limits() {
        let store = seeded().await;
        let options = FindOptions {
            sort: vec![("age".into(), SortOrder::Desc)],
            skip: 1,
            limit: Some(1),
            fields: Some(vec!["id".into()]),
        };
        let docs = store.find("person", &Condition::new(), &options).await.unwrap();
        assert_eq!(docs, vec![doc(json!({ "id": "c" }))]);
        assert_eq!(store.count("person", &Condition::new()).await.unwrap(), 3);
        assert_eq!(store.count("nobody", &Condition::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn save_replaces_by_id_and_update_merges() {
        let store = seeded().await;
        store.save("person", doc(json!({ "id": "a", "age": 31 }))).await.unwrap();
        assert_eq!(store.count("person", &Condition::new()).await.unwrap(), 3);

        let patch = doc(json!({ "name": "Ann" }));
        let updated = store
            .find_one_and_update("person", &Condition::by_id("a"), &patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Value::Object(updated), json!({ "id": "a", "age": 31, "name": "Ann" }));
        assert!(store
            .find_one_and_update("person", &Condition::by_id("zz"), &patch)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn removal() {
        let store = seeded().await;
        let removed = store.find_one_and_remove("person", &Condition::by_id("b")).await.unwrap();
        assert_eq!(removed.unwrap()["age"], 10);
        store.remove("person", "c").await.unwrap();
        let left = store.find("person", &Condition::new(), &FindOptions::default()).await.unwrap();
        assert_eq!(left.len(), 1);
        assert!(store.find_one("person", &Condition::by_id("c"), None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn near_orders_nearest_first() {
        let store = MemoryStore::new();
        for (id, lng) in [("far", 139.9), ("near", 139.70), ("mid", 139.8)] {
            let place = json!({ "id": id, "loc": { "type": "Point", "coordinates": [lng, 35.6] } });
            store.save("place", doc(place)).await.unwrap();
        }
        let mut c = Condition::new();
        c.set("loc", Predicate::Near(GeoNear::from_input("35.6,139.69,50000")));
        let docs = store.find("place", &c, &FindOptions::default()).await.unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, ["near", "mid", "far"]);
    }

    #[tokio::test]
    async fn invalid_patterns_fail_before_scanning() {
        let store = seeded().await;
        let mut c = Condition::new();
        c.set("id", Predicate::Pattern("[".into()));
        assert!(matches!(store.count("person", &c).await, Err(StoreError::InvalidQuery(_))));
        assert!(matches!(store.count("nobody", &c).await, Err(StoreError::InvalidQuery(_))));
        assert!(matches!(
            store.find_one_and_remove("person", &c).await,
            Err(StoreError::InvalidQuery(_))
        ));
        assert_eq!(store.count("person", &Condition::new()).await.unwrap(), 3);

        c.set("id", Predicate::Pattern("(?s)^[ab]$".into()));
        assert_eq!(store.count("person", &c).await.unwrap(), 2);
    }
}

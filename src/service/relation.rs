//! Relation resolution: relation fields rewritten as hypermedia links, or expanded one level deep.

use crate::config::{Registry, Relation, ResourceSchema};
use crate::error::AppError;
use crate::query::Condition;
use crate::store::{materialize, Document, DocumentStore};
use futures::future::try_join_all;
use serde_json::{json, Value};

/// A referenced instance to fetch and inline in place of its link.
struct Expansion<'s> {
    record: usize,
    field: String,
    target: &'s ResourceSchema,
    id: String,
}

pub struct RelationResolver<'a> {
    registry: &'a Registry,
    store: &'a dyn DocumentStore,
    prefix: &'a str,
}

impl<'a> RelationResolver<'a> {
    pub fn new(registry: &'a Registry, store: &'a dyn DocumentStore, prefix: &'a str) -> Self {
        RelationResolver { registry, store, prefix }
    }

    /// Resolve every relation field of every record. Relations named in `expands` are replaced by
    /// the referenced instance, itself link-resolved but not expanded further. `children` are never
    /// expanded. Output order follows `records`.
    pub async fn resolve(
        &self,
        schema: &ResourceSchema,
        collection_path: &str,
        records: Vec<Document>,
        expands: &[String],
        projection: Option<&[String]>,
    ) -> Result<Vec<Document>, AppError> {
        let mut records: Vec<Document> = records.into_iter().map(materialize).collect();
        let mut pending = Vec::new();
        for (index, record) in records.iter_mut().enumerate() {
            pending.extend(self.link_record(schema, collection_path, record, expands, projection, index));
        }
        if pending.is_empty() {
            return Ok(records);
        }

        tracing::debug!(resource = %schema.name, expansions = pending.len(), "expanding relations");
        let resolved = try_join_all(pending.into_iter().map(|e| self.expand(e))).await?;
        for (record, field, value) in resolved {
            records[record].insert(field, value);
        }
        Ok(records)
    }

    /// Links for one record without any expansion.
    pub fn link(&self, schema: &ResourceSchema, collection_path: &str, mut record: Document) -> Document {
        let pending = self.link_record(schema, collection_path, &mut record, &[], None, 0);
        debug_assert!(pending.is_empty());
        record
    }

    fn link_record(
        &self,
        schema: &ResourceSchema,
        collection_path: &str,
        record: &mut Document,
        expands: &[String],
        projection: Option<&[String]>,
        index: usize,
    ) -> Vec<Expansion<'a>> {
        let mut pending = Vec::new();
        let record_id = record.get("id").map(id_text).unwrap_or_default();

        for (attr, relation) in schema.relations() {
            let name = &attr.name;
            match relation {
                Relation::Children { .. } => {
                    if record.contains_key(name) {
                        let href = format!("{}/{}/{}/{}", self.prefix, collection_path, record_id, name);
                        record.insert(name.clone(), json!({ "href": href }));
                    }
                }
                Relation::Parent { .. } | Relation::Instance { .. } => {
                    let projected = projection.map_or(true, |fields| fields.iter().any(|f| f == name));
                    let value = match record.get(name) {
                        Some(v) => v.clone(),
                        // Absent instance references still render as a null link.
                        None if matches!(relation, Relation::Instance { .. }) && projected => Value::Null,
                        None => continue,
                    };
                    let target = self.registry.get(relation.target());
                    match (target, expands.iter().any(|e| e == name), &value) {
                        (Some(target), true, v) if !v.is_null() => pending.push(Expansion {
                            record: index,
                            field: name.clone(),
                            target,
                            id: id_text(v),
                        }),
                        _ => {
                            let plural = target.map(|t| t.plural.as_str()).unwrap_or(relation.target());
                            record.insert(name.clone(), self.reference_link(plural, &value));
                        }
                    }
                }
            }
        }
        pending
    }

    fn reference_link(&self, plural: &str, value: &Value) -> Value {
        let href = if value.is_null() {
            Value::Null
        } else {
            Value::String(format!("{}/{}/{}", self.prefix, plural, id_text(value)))
        };
        json!({ "href": href, "id": value })
    }

    async fn expand(&self, expansion: Expansion<'a>) -> Result<(usize, String, Value), AppError> {
        let Expansion { record, field, target, id } = expansion;
        let fields = target.field_names();
        let found = self
            .store
            .find_one(&target.name, &Condition::by_id(&id), Some(&fields))
            .await?;
        let value = match found {
            Some(doc) => Value::Object(self.link(target, &target.plural, materialize(doc))),
            None => self.reference_link(&target.plural, &Value::String(id)),
        };
        Ok((record, field, value))
    }
}

fn id_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

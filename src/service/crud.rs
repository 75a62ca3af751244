//! Resource operations: list, create, read, update, delete and children listing composed from
//! the condition compiler, identity resolver, relation resolver and pagination envelope.

use crate::config::{Registry, Relation, ResourceSchema, Settings, ID_FIELD, SEARCH_FIELD, UPDATED_AT_FIELD};
use crate::error::AppError;
use crate::query::{compile_condition, compile_params, parse_list, parse_order, Condition, Predicate, RequestParams, Window};
use crate::service::identity::{candidate_id, ensure_unused};
use crate::service::pagination::{envelope, Envelope};
use crate::service::record::{bump_timestamp, new_record, search_text, update_patch};
use crate::service::relation::RelationResolver;
use crate::service::validation::{check_unique_unchanged, Validator};
use crate::store::{Document, DocumentStore, FindOptions};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CreatedRef {
    pub id: String,
    pub href: String,
}

/// Result of a create: a single object body, or an `items` payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Created {
    One(CreatedRef),
    Many(Vec<CreatedRef>),
}

/// Create payload: one object, or `{"items": [...]}`.
pub enum CreateBody<'a> {
    One(&'a Map<String, Value>),
    Many(Vec<&'a Map<String, Value>>),
}

impl<'a> CreateBody<'a> {
    pub fn parse(body: &'a Value) -> Result<Self, AppError> {
        let obj = body
            .as_object()
            .ok_or_else(|| AppError::BadRequest("body must be a JSON object".into()))?;
        match obj.get("items") {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_object()
                        .ok_or_else(|| AppError::BadRequest("item must be a JSON object".into()).at_index(i))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(CreateBody::Many),
            _ => Ok(CreateBody::One(obj)),
        }
    }

    fn items(&self) -> Vec<&'a Map<String, Value>> {
        match self {
            CreateBody::One(item) => vec![*item],
            CreateBody::Many(items) => items.clone(),
        }
    }

    fn is_bulk(&self) -> bool {
        matches!(self, CreateBody::Many(_))
    }
}

/// Generic operations over any registered resource.
pub struct CrudService<'a> {
    registry: &'a Registry,
    store: &'a dyn DocumentStore,
    validator: &'a dyn Validator,
    settings: &'a Settings,
}

impl<'a> CrudService<'a> {
    pub fn new(
        registry: &'a Registry,
        store: &'a dyn DocumentStore,
        validator: &'a dyn Validator,
        settings: &'a Settings,
    ) -> Self {
        CrudService {
            registry,
            store,
            validator,
            settings,
        }
    }

    fn resolver(&self) -> RelationResolver<'a> {
        RelationResolver::new(self.registry, self.store, &self.settings.prefix)
    }

    fn href(&self, plural: &str, id: &str) -> String {
        format!("{}/{}/{}", self.settings.prefix, plural, id)
    }

    /// Collection window matching the request filters.
    pub async fn list(&self, schema: &ResourceSchema, req: &RequestParams<'_>) -> Result<Envelope<Document>, AppError> {
        let condition = compile_condition(schema, req);
        let base = format!("{}/{}", self.settings.prefix, schema.plural);
        self.list_where(schema, condition, req, &base).await
    }

    /// Children of `id` listed through the owner's `children` attribute `field`.
    pub async fn children_list(
        &self,
        owner: &ResourceSchema,
        id: &str,
        field: &str,
        req: &RequestParams<'_>,
    ) -> Result<Envelope<Document>, AppError> {
        let child_name = match owner.attribute(field).and_then(|a| a.field_type.relation()) {
            Some(Relation::Children { resource }) => resource,
            _ => return Err(AppError::NotFound(format!("{}/{}/{}", owner.plural, id, field))),
        };
        let child = self
            .registry
            .get(child_name)
            .ok_or_else(|| AppError::NotFound(child_name.clone()))?;
        let parent_key = child
            .parent_attribute_for(&owner.name, field)
            .map(|a| a.name.clone())
            .ok_or_else(|| AppError::NotFound(format!("{}/{}/{}", owner.plural, id, field)))?;

        let mut condition = compile_condition(child, req);
        condition.remove(ID_FIELD);
        condition.set(&parent_key, Predicate::Exact(Value::String(id.to_string())));
        let base = format!("{}/{}/{}/{}", self.settings.prefix, owner.plural, id, field);
        self.list_where(child, condition, req, &base).await
    }

    async fn list_where(
        &self,
        schema: &ResourceSchema,
        condition: Condition,
        req: &RequestParams<'_>,
        base: &str,
    ) -> Result<Envelope<Document>, AppError> {
        let window = Window::from_query(req.query, self.settings.default_limit);
        let fields = projection(req);
        let options = FindOptions {
            fields: fields.clone(),
            skip: window.offset,
            limit: Some(window.limit),
            sort: req.query_str("orderBy").map(parse_order).unwrap_or_default(),
        };
        let records = self.store.find(&schema.name, &condition, &options).await?;
        let size = self.store.count(&schema.name, &condition).await?;
        let expands = parse_list(req.query_str("expands"));
        let items = self
            .resolver()
            .resolve(schema, &schema.plural, records, &expands, fields.as_deref())
            .await?;
        Ok(envelope(base, window, size, items))
    }

    /// One instance by id, relations resolved.
    pub async fn read(&self, schema: &ResourceSchema, id: &str, req: &RequestParams<'_>) -> Result<Document, AppError> {
        let fields = projection(req);
        let record = self
            .store
            .find_one(&schema.name, &Condition::by_id(id), fields.as_deref())
            .await?
            .ok_or_else(|| AppError::NotFound(self.href(&schema.plural, id)))?;
        let expands = parse_list(req.query_str("expands"));
        let mut resolved = self
            .resolver()
            .resolve(schema, &schema.plural, vec![record], &expands, fields.as_deref())
            .await?;
        resolved
            .pop()
            .ok_or_else(|| AppError::NotFound(self.href(&schema.plural, id)))
    }

    /// Create one instance or, for an `items` payload, each item in order. Items committed before
    /// a failing one stay committed; the failure carries the item's index.
    pub async fn create(&self, schema: &ResourceSchema, body: &Value, req: &RequestParams<'_>) -> Result<Created, AppError> {
        let body = CreateBody::parse(body)?;
        let mut refs = Vec::new();
        for (index, item) in body.items().into_iter().enumerate() {
            let created = self.create_item(schema, &req.with_body(item)).await;
            match created {
                Ok(r) => refs.push(r),
                Err(e) if body.is_bulk() => return Err(e.at_index(index)),
                Err(e) => return Err(e),
            }
        }
        if body.is_bulk() {
            Ok(Created::Many(refs))
        } else {
            refs.pop()
                .map(Created::One)
                .ok_or_else(|| AppError::BadRequest("nothing to create".into()))
        }
    }

    async fn create_item(&self, schema: &ResourceSchema, req: &RequestParams<'_>) -> Result<CreatedRef, AppError> {
        let params = compile_params(&schema.attributes, req);
        self.check_related(schema, &params).await?;
        self.validator.validate(schema, &params, false).into_result()?;

        let id = candidate_id(&schema.unique_fields(), &params);
        ensure_unused(self.store, &schema.name, &id).await?;

        let record = new_record(schema, &params, &id);
        self.append_to_owners(schema, &record, &id).await?;
        self.store.save(&schema.name, record).await?;

        let href = self.href(&schema.plural, &id);
        tracing::info!(resource = %schema.name, id = %id, "created");
        Ok(CreatedRef { id, href })
    }

    /// Dry run of create: related-entity checks and validation for every item, nothing persisted.
    pub async fn validate_only(&self, schema: &ResourceSchema, body: &Value, req: &RequestParams<'_>) -> Result<(), AppError> {
        let body = CreateBody::parse(body)?;
        for (index, item) in body.items().into_iter().enumerate() {
            let params = compile_params(&schema.attributes, &req.with_body(item));
            let checked = match self.check_related(schema, &params).await {
                Ok(()) => self.validator.validate(schema, &params, false).into_result(),
                Err(e) => Err(e),
            };
            checked.map_err(|e| if body.is_bulk() { e.at_index(index) } else { e })?;
        }
        Ok(())
    }

    /// Partial merge of the supplied fields into an existing instance.
    pub async fn update(&self, schema: &ResourceSchema, id: &str, req: &RequestParams<'_>) -> Result<(), AppError> {
        let attributes: Vec<_> = schema
            .attributes
            .iter()
            .filter(|a| !a.field_type.is_children())
            .cloned()
            .collect();
        let params = compile_params(&attributes, req);
        check_unique_unchanged(schema, &params).into_result()?;
        self.validator.validate(schema, &params, true).into_result()?;
        self.check_related(schema, &params).await?;

        let condition = Condition::by_id(id);
        let current = self
            .store
            .find_one(&schema.name, &condition, None)
            .await?
            .ok_or_else(|| AppError::NotFound(self.href(&schema.plural, id)))?;

        let mut patch = update_patch(schema, &params);
        patch.insert(
            UPDATED_AT_FIELD.into(),
            Value::String(bump_timestamp(current.get(UPDATED_AT_FIELD))),
        );
        if schema.text_fields().iter().any(|f| patch.contains_key(*f)) {
            let mut merged = current.clone();
            merged.extend(patch.clone());
            patch.insert(SEARCH_FIELD.into(), Value::String(search_text(schema, &merged)));
        }

        self.store
            .find_one_and_update(&schema.name, &condition, &patch)
            .await?
            .ok_or_else(|| AppError::NotFound(self.href(&schema.plural, id)))?;
        self.append_to_owners(schema, &patch, id).await?;
        tracing::info!(resource = %schema.name, id = %id, "updated");
        Ok(())
    }

    /// Remove every instance matching the request filters, one by one. Returns how many were removed.
    pub async fn delete_collection(&self, schema: &ResourceSchema, req: &RequestParams<'_>) -> Result<u64, AppError> {
        let condition = compile_condition(schema, req);
        let options = FindOptions {
            fields: Some(vec![ID_FIELD.to_string()]),
            ..FindOptions::default()
        };
        let matches = self.store.find(&schema.name, &condition, &options).await?;
        let mut removed = 0;
        for record in matches {
            if let Some(id) = record.get(ID_FIELD).and_then(Value::as_str) {
                self.store.remove(&schema.name, id).await?;
                removed += 1;
            }
        }
        tracing::info!(resource = %schema.name, removed, "removed matching instances");
        Ok(removed)
    }

    /// Remove one instance. Removing an absent id is not an error.
    pub async fn delete_instance(&self, schema: &ResourceSchema, id: &str) -> Result<(), AppError> {
        let removed = self
            .store
            .find_one_and_remove(&schema.name, &Condition::by_id(id))
            .await?;
        if removed.is_some() {
            tracing::info!(resource = %schema.name, id = %id, "removed");
        }
        Ok(())
    }

    /// Every supplied `parent`/`instance` reference must name an existing record.
    async fn check_related(&self, schema: &ResourceSchema, params: &Map<String, Value>) -> Result<(), AppError> {
        for (attr, relation) in schema.relations() {
            if matches!(relation, Relation::Children { .. }) {
                continue;
            }
            let id = match params.get(&attr.name) {
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            };
            let target = relation.target();
            let fields = [ID_FIELD.to_string()];
            let found = self
                .store
                .find_one(target, &Condition::by_id(&id), Some(&fields))
                .await?;
            if found.is_none() {
                return Err(AppError::RelatedEntityMissing {
                    field: attr.name.clone(),
                    message: format!("Specified ID ({}) does not exist in {}", id, target),
                });
            }
        }
        Ok(())
    }

    /// Owner bookkeeping for each `parent` reference in `values`: the child id is appended to the
    /// owner's array field and the owner's `updatedAt` is bumped. Absent owners are skipped.
    /// Not transactional with the child's own write.
    async fn append_to_owners(&self, schema: &ResourceSchema, values: &Map<String, Value>, child_id: &str) -> Result<(), AppError> {
        for (attr, relation) in schema.relations() {
            let Relation::Parent { owner, field } = relation else {
                continue;
            };
            let owner_id = match values.get(&attr.name) {
                Some(Value::String(s)) => s.clone(),
                None | Some(Value::Null) => continue,
                Some(other) => other.to_string(),
            };
            let Some(mut owner_doc) = self.store.find_one(owner, &Condition::by_id(&owner_id), None).await? else {
                continue;
            };
            let child = Value::String(child_id.to_string());
            let slot = owner_doc.entry(field.clone()).or_insert_with(|| Value::Array(Vec::new()));
            if !slot.is_array() {
                *slot = Value::Array(Vec::new());
            }
            if let Value::Array(children) = slot {
                if !children.contains(&child) {
                    children.push(child);
                }
            }
            let updated_at = bump_timestamp(owner_doc.get(UPDATED_AT_FIELD));
            owner_doc.insert(UPDATED_AT_FIELD.into(), Value::String(updated_at));
            tracing::debug!(owner = %owner, id = %owner_id, field = %field, child = %child_id, "appending child to owner");
            self.store.save(owner, owner_doc).await?;
        }
        Ok(())
    }
}

/// Requested `fields`, always including `id`. `None` when no projection was asked for.
fn projection(req: &RequestParams<'_>) -> Option<Vec<String>> {
    let mut fields = parse_list(req.query_str("fields"));
    if fields.is_empty() {
        return None;
    }
    if !fields.iter().any(|f| f == ID_FIELD) {
        fields.insert(0, ID_FIELD.to_string());
    }
    Some(fields)
}

/// Path parameters for an instance route.
pub fn instance_path(id: &str) -> HashMap<String, String> {
    HashMap::from([(ID_FIELD.to_string(), id.to_string())])
}

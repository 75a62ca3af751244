//! Resource handlers. Every route resolves its resource from the path segment, then runs
//! authenticate, pre-hook, the operation, post-hook.

use crate::config::ResourceSchema;
use crate::error::AppError;
use crate::extractors::{Credentials, RequestMode};
use crate::hooks::{HookContext, Operation};
use crate::json_schema;
use crate::query::RequestParams;
use crate::response::{created, respond};
use crate::service::instance_path;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

type QueryMap = HashMap<String, String>;

fn resource<'s>(state: &'s AppState, segment: &str) -> Result<&'s ResourceSchema, AppError> {
    state
        .registry
        .by_path(segment)
        .ok_or_else(|| AppError::NotFound(format!("{}/{}", state.settings.prefix, segment)))
}

fn body_object(body: &Value) -> Result<&Map<String, Value>, AppError> {
    body.as_object()
        .ok_or_else(|| AppError::BadRequest("body must be a JSON object".into()))
}

/// Filter body for collection reads and deletes. An empty body is no body.
fn optional_body(bytes: &Bytes) -> Result<Option<Value>, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let body: Value = serde_json::from_slice(bytes).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))?;
    body_object(&body)?;
    Ok(Some(body))
}

pub async fn list(
    State(state): State<AppState>,
    _auth: Credentials,
    mode: RequestMode,
    headers: HeaderMap,
    Path(segment): Path<String>,
    Query(query): Query<QueryMap>,
    bytes: Bytes,
) -> Result<Response, AppError> {
    let schema = resource(&state, &segment)?;
    let body = optional_body(&bytes)?;
    let ctx = HookContext::new(schema, Operation::List)
        .with_request(&query, &headers)
        .with_body(body.as_ref());
    state.hooks.before(&ctx).await?;
    if mode.json_schema {
        let described = json_schema::describe(&state.settings.prefix, schema);
        return respond(&state, &ctx, StatusCode::OK, Some(described)).await;
    }
    let path = QueryMap::new();
    let req = RequestParams::new(body.as_ref().and_then(Value::as_object), &path, &query);
    let page = state.service().list(schema, &req).await?;
    respond(&state, &ctx, StatusCode::OK, Some(serde_json::to_value(page)?)).await
}

pub async fn create(
    State(state): State<AppState>,
    _auth: Credentials,
    mode: RequestMode,
    headers: HeaderMap,
    Path(segment): Path<String>,
    Query(query): Query<QueryMap>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let schema = resource(&state, &segment)?;
    let ctx = HookContext::new(schema, Operation::Create)
        .with_request(&query, &headers)
        .with_body(Some(&body));
    state.hooks.before(&ctx).await?;
    let path = QueryMap::new();
    let req = RequestParams::new(None, &path, &query);
    if mode.validation {
        state.service().validate_only(schema, &body, &req).await?;
        return respond(&state, &ctx, StatusCode::OK, Some(json!({}))).await;
    }
    let result = state.service().create(schema, &body, &req).await?;
    created(&state, &ctx, result).await
}

/// Removes every instance matching the query filters and, when a JSON object body is sent, its filters too.
pub async fn delete_collection(
    State(state): State<AppState>,
    _auth: Credentials,
    headers: HeaderMap,
    Path(segment): Path<String>,
    Query(query): Query<QueryMap>,
    bytes: Bytes,
) -> Result<Response, AppError> {
    let schema = resource(&state, &segment)?;
    let body = optional_body(&bytes)?;
    let ctx = HookContext::new(schema, Operation::DeleteCollection)
        .with_request(&query, &headers)
        .with_body(body.as_ref());
    state.hooks.before(&ctx).await?;
    let path = QueryMap::new();
    let req = RequestParams::new(body.as_ref().and_then(Value::as_object), &path, &query);
    state.service().delete_collection(schema, &req).await?;
    respond(&state, &ctx, StatusCode::NO_CONTENT, None).await
}

pub async fn read(
    State(state): State<AppState>,
    _auth: Credentials,
    headers: HeaderMap,
    Path((segment, id)): Path<(String, String)>,
    Query(query): Query<QueryMap>,
) -> Result<Response, AppError> {
    let schema = resource(&state, &segment)?;
    let ctx = HookContext::new(schema, Operation::Read)
        .with_id(&id)
        .with_request(&query, &headers);
    state.hooks.before(&ctx).await?;
    let path = instance_path(&id);
    let req = RequestParams::new(None, &path, &query);
    let record = state.service().read(schema, &id, &req).await?;
    respond(&state, &ctx, StatusCode::OK, Some(Value::Object(record))).await
}

pub async fn update(
    State(state): State<AppState>,
    _auth: Credentials,
    headers: HeaderMap,
    Path((segment, id)): Path<(String, String)>,
    Query(query): Query<QueryMap>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let schema = resource(&state, &segment)?;
    let ctx = HookContext::new(schema, Operation::Update)
        .with_id(&id)
        .with_request(&query, &headers)
        .with_body(Some(&body));
    state.hooks.before(&ctx).await?;
    let path = instance_path(&id);
    let req = RequestParams::new(Some(body_object(&body)?), &path, &query);
    state.service().update(schema, &id, &req).await?;
    respond(&state, &ctx, StatusCode::NO_CONTENT, None).await
}

pub async fn delete_instance(
    State(state): State<AppState>,
    _auth: Credentials,
    headers: HeaderMap,
    Path((segment, id)): Path<(String, String)>,
    Query(query): Query<QueryMap>,
) -> Result<Response, AppError> {
    let schema = resource(&state, &segment)?;
    let ctx = HookContext::new(schema, Operation::DeleteInstance)
        .with_id(&id)
        .with_request(&query, &headers);
    state.hooks.before(&ctx).await?;
    state.service().delete_instance(schema, &id).await?;
    respond(&state, &ctx, StatusCode::NO_CONTENT, None).await
}

pub async fn children_list(
    State(state): State<AppState>,
    _auth: Credentials,
    headers: HeaderMap,
    Path((segment, id, field)): Path<(String, String, String)>,
    Query(query): Query<QueryMap>,
) -> Result<Response, AppError> {
    let owner = resource(&state, &segment)?;
    let ctx = HookContext::new(owner, Operation::ChildrenList)
        .with_id(&id)
        .with_request(&query, &headers);
    state.hooks.before(&ctx).await?;
    let path = instance_path(&id);
    let req = RequestParams::new(None, &path, &query);
    let page = state.service().children_list(owner, &id, &field, &req).await?;
    respond(&state, &ctx, StatusCode::OK, Some(serde_json::to_value(page)?)).await
}

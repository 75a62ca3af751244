//! Response helpers: post-hook application and created-resource bodies.

use crate::error::AppError;
use crate::hooks::HookContext;
use crate::service::Created;
use crate::state::AppState;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

/// Pass `body` through the post-hook and render it. An empty body renders as status only.
pub async fn respond(state: &AppState, ctx: &HookContext, status: StatusCode, body: Option<Value>) -> Result<Response, AppError> {
    let body = state.hooks.after(ctx, body).await?;
    Ok(match body {
        Some(v) => (status, Json(v)).into_response(),
        None => status.into_response(),
    })
}

/// `201` with `{id, href}` and a `Location` header, or `{items: [...]}` for bulk creates.
pub async fn created(state: &AppState, ctx: &HookContext, created: Created) -> Result<Response, AppError> {
    let (location, body) = match created {
        Created::One(r) => (Some(r.href.clone()), serde_json::to_value(r)?),
        Created::Many(items) => (None, json!({ "items": items })),
    };
    let mut response = respond(state, ctx, StatusCode::CREATED, Some(body)).await?;
    if let Some(href) = location {
        if let Ok(value) = href.parse() {
            response.headers_mut().insert(header::LOCATION, value);
        }
    }
    Ok(response)
}

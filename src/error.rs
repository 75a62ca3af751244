//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Per-field validation messages, keyed by attribute name.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid relation '{relation}' on {resource}.{attribute}")]
    InvalidRelation {
        resource: String,
        attribute: String,
        relation: String,
    },
    #[error("attribute name '{attribute}' on {resource} is reserved")]
    ReservedAttribute { resource: String, attribute: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed")]
    ValidationFailed(FieldErrors),
    #[error("related entity missing: {message}")]
    RelatedEntityMissing { field: String, message: String },
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("item {index}: {error}")]
    Item { index: usize, error: Box<AppError> },
    #[error("response encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

impl AppError {
    /// Tag an error with the index of the bulk item that produced it.
    pub fn at_index(self, index: usize) -> Self {
        AppError::Item {
            index,
            error: Box::new(self),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Store(StoreError::InvalidQuery(_)) => StatusCode::BAD_REQUEST,
            AppError::Config(_) | AppError::Store(_) | AppError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ValidationFailed(_) | AppError::RelatedEntityMissing { .. } | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Item { error, .. } => error.status(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::ValidationFailed(_) => "validation_error",
            AppError::RelatedEntityMissing { .. } => "related_entity_missing",
            AppError::Store(_) => "store_error",
            AppError::Encode(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::Item { error, .. } => error.code(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::ValidationFailed(fields) => Some(serde_json::json!({ "fields": fields })),
            AppError::RelatedEntityMissing { field, message } => {
                Some(serde_json::json!({ "fields": { field: message } }))
            }
            AppError::Item { index, error } => {
                let mut details = error.details().unwrap_or_else(|| serde_json::json!({}));
                if let Some(obj) = details.as_object_mut() {
                    obj.insert("index".into(), (*index).into());
                }
                Some(details)
            }
            _ => None,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        (status, Json(body)).into_response()
    }
}

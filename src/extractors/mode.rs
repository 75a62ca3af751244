//! Auxiliary request modes selected by header.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const JSON_SCHEMA_HEADER: &str = "X-JSON-Schema";
pub const VALIDATION_HEADER: &str = "X-Validation";

/// `X-JSON-Schema: true` describes the resource instead of listing it.
/// `X-Validation: true` validates a create payload without persisting it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestMode {
    pub json_schema: bool,
    pub validation: bool,
}

fn flag(parts: &Parts, name: &str) -> bool {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|s| s.trim() == "true")
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestMode
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestMode {
            json_schema: flag(parts, JSON_SCHEMA_HEADER),
            validation: flag(parts, VALIDATION_HEADER),
        })
    }
}

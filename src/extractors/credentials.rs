//! Caller authentication from the `X-Api-Client` / `X-Api-Secret` headers.

use crate::error::AppError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

pub const CLIENT_HEADER: &str = "X-Api-Client";
pub const SECRET_HEADER: &str = "X-Api-Secret";

/// Proof that the request carried the configured credentials. Always succeeds when none are configured.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub client: Option<String>,
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for Credentials {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let client = header(parts, CLIENT_HEADER);
        let Some((expected_client, expected_secret)) = &state.settings.credentials else {
            return Ok(Credentials { client });
        };
        let secret = header(parts, SECRET_HEADER);
        if client.as_deref() == Some(expected_client.as_str()) && secret.as_deref() == Some(expected_secret.as_str()) {
            return Ok(Credentials { client });
        }
        tracing::warn!(client = ?client, path = %parts.uri.path(), "rejected credentials");
        Err(AppError::Unauthorized("missing or incorrect client credentials".into()))
    }
}

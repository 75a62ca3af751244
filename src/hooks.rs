//! Pre/post operation hooks wrapped around every generated route.

use crate::config::ResourceSchema;
use crate::error::AppError;
use async_trait::async_trait;
use axum::http::HeaderMap;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    List,
    Create,
    Read,
    Update,
    DeleteCollection,
    DeleteInstance,
    ChildrenList,
}

/// What a hook sees of the request being served.
#[derive(Clone, Debug)]
pub struct HookContext {
    /// Resource name, not its plural.
    pub resource: String,
    pub operation: Operation,
    /// Instance id for instance and children routes.
    pub id: Option<String>,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    /// Parsed request body, when one was sent.
    pub body: Option<Value>,
}

impl HookContext {
    pub fn new(schema: &ResourceSchema, operation: Operation) -> Self {
        HookContext {
            resource: schema.name.clone(),
            operation,
            id: None,
            query: HashMap::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_request(mut self, query: &HashMap<String, String>, headers: &HeaderMap) -> Self {
        self.query = query.clone();
        self.headers = headers.clone();
        self
    }

    pub fn with_body(mut self, body: Option<&Value>) -> Self {
        self.body = body.cloned();
        self
    }

    /// Header value as text; `None` when absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// `before` runs after authentication and may reject the request. `after` receives the response
/// body (`None` for empty responses) and returns the body to send.
#[async_trait]
pub trait Hooks: Send + Sync {
    async fn before(&self, _ctx: &HookContext) -> Result<(), AppError> {
        Ok(())
    }

    async fn after(&self, _ctx: &HookContext, body: Option<Value>) -> Result<Option<Value>, AppError> {
        Ok(body)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;

impl Hooks for NoopHooks {}

//! Schema REST: declarative resource schemas served as hypermedia REST collections over a document store.

pub mod case;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod hooks;
pub mod json_schema;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_from_path, resolve, Registry, ResourceSchema, SchemaConfig, Settings};
pub use error::{AppError, ConfigError, StoreError};
pub use hooks::{HookContext, Hooks, NoopHooks, Operation};
pub use routes::{app, common_routes, resource_routes};
pub use service::{CrudService, RuleValidator, Validator};
pub use state::AppState;
pub use store::{ensure_database_exists, DocumentStore, MemoryStore, PgDocumentStore};

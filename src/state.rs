//! Shared application state for all routes. The registry is read-only once built.

use crate::config::{Registry, Settings};
use crate::hooks::{Hooks, NoopHooks};
use crate::service::{CrudService, RuleValidator, Validator};
use crate::store::DocumentStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub store: Arc<dyn DocumentStore>,
    pub validator: Arc<dyn Validator>,
    pub hooks: Arc<dyn Hooks>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// State with the rule validator and no-op hooks.
    pub fn new(registry: Registry, store: Arc<dyn DocumentStore>, settings: Settings) -> Self {
        AppState {
            registry: Arc::new(registry),
            store,
            validator: Arc::new(RuleValidator),
            hooks: Arc::new(NoopHooks),
            settings: Arc::new(settings),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn service(&self) -> CrudService<'_> {
        CrudService::new(&self.registry, self.store.as_ref(), self.validator.as_ref(), &self.settings)
    }
}

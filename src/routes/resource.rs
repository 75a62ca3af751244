//! Resource routes. Paths are parameterized; handlers resolve the resource from its plural segment,
//! so every registered resource is served without per-resource route code.

use crate::handlers::{children_list, create, delete_collection, delete_instance, list, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub fn resource_routes(state: AppState) -> Router {
    let routes = Router::new()
        .route("/:segment", get(list).post(create).delete(delete_collection))
        .route(
            "/:segment/:id",
            get(read).post(update).patch(update).delete(delete_instance),
        )
        .route("/:segment/:id/:field", get(children_list))
        .with_state(state.clone());
    if state.settings.prefix.is_empty() {
        routes
    } else {
        Router::new().nest(&state.settings.prefix, routes)
    }
}

/// Resource routes plus `/health` and `/version`, with the body size limit applied.
pub fn app(state: AppState) -> Router {
    super::common_routes()
        .merge(resource_routes(state))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)))
}

//! Router construction.

mod common;
mod resource;

pub use common::common_routes;
pub use resource::{app, resource_routes};

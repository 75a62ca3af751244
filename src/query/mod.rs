//! Request-to-query compilation: parameter extraction and store conditions.

pub mod condition;
pub mod params;
pub use condition::*;
pub use params::*;

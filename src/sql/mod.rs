//! Safe SQL builder for the JSONB document store: identifiers from settings only, field names and values as parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;

//! Request extractors shared by the resource handlers.

pub mod credentials;
pub mod mode;

pub use credentials::Credentials;
pub use mode::RequestMode;

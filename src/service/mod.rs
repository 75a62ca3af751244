//! Resource operations and the components they are composed from.

mod crud;
pub mod identity;
pub mod pagination;
pub mod record;
pub mod relation;
pub mod validation;

pub use crud::{instance_path, CreateBody, Created, CreatedRef, CrudService};
pub use pagination::{envelope, Envelope};
pub use relation::RelationResolver;
pub use validation::{RuleValidator, ValidationReport, Validator};

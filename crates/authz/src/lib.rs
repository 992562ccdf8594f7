pub mod authorizer;
pub mod error;

pub use authorizer::{Action, Actor, Resource, RoleAuthorizer, Scope};
pub use error::{AuthzError, DenyReason, Result};

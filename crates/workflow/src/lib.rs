pub mod error;
pub mod transition;

pub use error::{Result, WorkflowError};
pub use transition::{allowed_transitions, can_transition, transition};

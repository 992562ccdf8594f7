use taskhub_models::TaskStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// Requested status is not in the current status's allowed set. User
    /// visible: names both states.
    #[error("cannot move task from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

use taskhub_authz::AuthzError;
use taskhub_store::StoreError;
use taskhub_workflow::WorkflowError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(String),

    /// First-auth provisioning: the email's domain matches no organization.
    #[error("no organization accepts the domain {0}")]
    EmailDomainNotAllowed(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::Validation(errors.to_string())
    }
}

impl ServiceError {
    /// Whether the caller must force a sign-out (disabled account denial).
    pub fn requires_sign_out(&self) -> bool {
        matches!(self, ServiceError::Authz(err) if err.requires_sign_out())
    }
}

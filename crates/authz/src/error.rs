use crate::authorizer::Action;
use taskhub_models::Role;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthzError>;

/// Which check failed. Kept for structured logging only; the user-visible
/// message never reveals it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    MinimumRole(Role),
    Ownership,
    NotAssignee,
    AccountDisabled,
    SelfPrivilegeChange,
}

#[derive(Debug, Error)]
pub enum AuthzError {
    /// Generic denial. The display string is deliberately uniform so callers
    /// cannot leak which check failed or any entity contents.
    #[error("not authorized")]
    PermissionDenied {
        action: Action,
        reason: DenyReason,
    },
}

impl AuthzError {
    pub fn denied(action: Action, reason: DenyReason) -> Self {
        AuthzError::PermissionDenied { action, reason }
    }

    /// Disabled accounts fail every check; the caller must additionally force
    /// a sign-out when this returns true.
    pub fn requires_sign_out(&self) -> bool {
        matches!(
            self,
            AuthzError::PermissionDenied {
                reason: DenyReason::AccountDisabled,
                ..
            }
        )
    }
}

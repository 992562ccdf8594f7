use crate::query::QueryError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    /// Primary transport unreachable. ScopedStore retries the operation on
    /// the fallback transport before surfacing anything to the caller.
    #[error("store transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Both transports failed. Retryable connectivity error.
    #[error("store unavailable, retry later: {0}")]
    Unavailable(String),

    /// Cross-org addressing. Programming-contract violation, never reachable
    /// through the public API surface; logged and aborted, not recovered.
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("invalid query: {0}")]
    Query(#[from] QueryError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the caller may retry the operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::TransportUnavailable(_) | StoreError::Unavailable(_)
        )
    }
}

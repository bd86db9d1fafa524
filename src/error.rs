//! Error types
//!
//! `GatewayError` is the request-level taxonomy, `BackendError` covers
//! failures of a single blob store call.

use thiserror::Error;

/// Failure of one blob store call. Retried by the resilient client.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),
}

/// Request-level failure
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("not found")]
    NotFound,

    #[error("range not satisfiable")]
    RangeNotSatisfiable { size: Option<u64> },

    /// Retry budget exhausted; surfaced to the hosting layer as is
    #[error("backend failure: {0}")]
    Backend(#[from] BackendError),
}

impl BackendError {
    /// Whether retrying the call can succeed
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidKey(_))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_key_is_not_transient() {
        assert!(BackendError::Unavailable("down".into()).is_transient());
        assert!(BackendError::Io(std::io::Error::other("reset")).is_transient());
        assert!(!BackendError::InvalidKey("../x".into()).is_transient());
    }
}

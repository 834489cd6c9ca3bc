//! Backend error types.

use thiserror::Error;

/// Classified failure of a remote backend call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Credentials rejected, account unconfirmed, or token invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The requested row does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    /// The caller's token is not allowed to perform the request (HTTP 401/403).
    #[error("request not authorized: {0}")]
    Unauthorized(String),

    /// Network failure, rate limiting or a 5xx response.
    #[error("backend unavailable: {0}")]
    Transient(String),

    /// Any other non-success response.
    #[error("backend rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn not_found(entity: &str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            key: key.into(),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

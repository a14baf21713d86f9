//! Error types for snapshot loading
//!
//! Whatever goes wrong, the store fails closed: an errored load leaves no
//! snapshot behind and every gated action stays hidden.

use thiserror::Error;

use crate::config::ConfigError;

/// Snapshot store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request never produced a response (DNS, connect, timeout)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server rejected the session
    #[error("Authentication failed ({status})")]
    Auth {
        /// HTTP status code (401 or 403).
        status: u16,
    },

    /// The server answered with a non-success status
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// The response body is not a permission snapshot
    #[error("Invalid snapshot response: {0}")]
    InvalidResponse(String),

    /// Invalidations kept overtaking the fetch
    #[error("Snapshot load superseded by invalidation after {attempts} attempts")]
    Superseded {
        /// Fetches that completed stale.
        attempts: u32,
    },

    /// The HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for snapshot store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Whether another attempt might succeed.
    ///
    /// Network failures and 5xx answers are transient; auth failures and
    /// malformed bodies are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Network(_) => true,
            StoreError::Server { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Whether the session itself is no longer valid.
    pub fn is_auth(&self) -> bool {
        matches!(self, StoreError::Auth { .. })
    }

    /// Get error code for diagnostics.
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::Network(_) => "NETWORK_ERROR",
            StoreError::Auth { .. } => "AUTH_ERROR",
            StoreError::Server { .. } => "SERVER_ERROR",
            StoreError::InvalidResponse(_) => "INVALID_RESPONSE",
            StoreError::Superseded { .. } => "SUPERSEDED",
            StoreError::Client(_) => "CLIENT_ERROR",
            StoreError::Config(_) => "CONFIG_ERROR",
        }
    }
}

//! Error types for route table construction
//!
//! Route decisions never fail; everything here is reported while the
//! table and its self-service exceptions are being built.

use thiserror::Error;

/// Route table error types.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A rule's path pattern is not a valid regex
    #[error("Invalid path pattern for rule {rule_id}: {message}")]
    InvalidPattern {
        /// Rule the pattern belongs to.
        rule_id: String,
        /// Compiler message.
        message: String,
    },

    /// Two rules share an id
    #[error("Duplicate route rule id: {0}")]
    DuplicateRuleId(String),

    /// A self-service exception names a rule that is not in the table
    #[error("Self-service exception references unknown rule: {0}")]
    UnknownRule(String),

    /// A self-service exception names a capture group the rule lacks
    #[error("Rule {rule_id} has no capture group named {param}")]
    MissingCapture {
        /// Rule the exception refers to.
        rule_id: String,
        /// Capture group name that was expected.
        param: String,
    },

    /// Route table JSON could not be decoded
    #[error("Invalid route table JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for route table operations.
pub type RouteResult<T> = Result<T, RouteError>;

impl RouteError {
    /// Get error code for diagnostics.
    pub fn error_code(&self) -> &'static str {
        match self {
            RouteError::InvalidPattern { .. } => "INVALID_PATTERN",
            RouteError::DuplicateRuleId(_) => "DUPLICATE_RULE_ID",
            RouteError::UnknownRule(_) => "UNKNOWN_RULE",
            RouteError::MissingCapture { .. } => "MISSING_CAPTURE",
            RouteError::Json(_) => "INVALID_JSON",
        }
    }
}

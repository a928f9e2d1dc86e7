//! Error types shared across ChargeSquare crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised by the shared helpers
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Environment variable {name} has invalid value '{value}': {reason}")]
    InvalidEnv {
        name: String,
        value: String,
        reason: String,
    },
}

impl CommonError {
    pub fn invalid_env(
        name: impl Into<String>,
        value: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidEnv {
            name: name.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

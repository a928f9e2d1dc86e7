//! Shared validation utilities
//!
//! Field checks used by commands before anything reaches the store.

use thiserror::Error;

/// Errors that can occur during field validation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },

    #[error("{field} cannot be blank")]
    Blank { field: &'static str },

    #[error("{field} must be at most {max_length} characters")]
    TooLong {
        field: &'static str,
        max_length: usize,
    },

    #[error("{field} must be greater than 0")]
    NotPositive { field: &'static str },
}

/// Require a value to be present.
pub fn require<T>(value: Option<T>, field: &'static str) -> Result<T, FieldValidationError> {
    value.ok_or(FieldValidationError::Required { field })
}

/// Validate a required free-text field
///
/// # Rules
/// - Must be present
/// - Must contain something other than whitespace
/// - Must not exceed `max_length` characters, when a limit is given
pub fn validate_text(
    value: Option<&str>,
    field: &'static str,
    max_length: Option<usize>,
) -> Result<(), FieldValidationError> {
    let value = require(value, field)?;

    if value.trim().is_empty() {
        return Err(FieldValidationError::Blank { field });
    }

    if let Some(max_length) = max_length {
        if value.chars().count() > max_length {
            return Err(FieldValidationError::TooLong { field, max_length });
        }
    }

    Ok(())
}

/// Validate that a number is present, finite and strictly positive.
pub fn validate_positive(value: Option<f64>, field: &'static str) -> Result<f64, FieldValidationError> {
    let value = require(value, field)?;
    if !value.is_finite() || value <= 0.0 {
        return Err(FieldValidationError::NotPositive { field });
    }
    Ok(value)
}

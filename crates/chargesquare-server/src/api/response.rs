//! API response types
//!
//! Successful station responses are the bare resource JSON. Failures share
//! one envelope:
//!
//! ```json
//! { "success": false, "error": { "code": "NOT_FOUND", "message": "Station 999 not found" } }
//! ```

use serde::{Deserialize, Serialize};

/// Standard error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

//! Ledger error types.

use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur against the usage database.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to configure database client: {0}")]
    ConfigError(String),

    #[error("Insufficient credits: {available} available")]
    InsufficientCredits { available: u32 },

    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Request failed ({status}): {body}")]
    RequestFailed { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// True if the operation failed because the balance was too low.
    pub fn is_insufficient_credits(&self) -> bool {
        matches!(self, LedgerError::InsufficientCredits { .. })
    }
}

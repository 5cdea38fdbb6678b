//! Provider error types.

use std::time::Duration;

use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors from a single request to the inference provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Failed to configure provider client: {0}")]
    ConfigError(String),

    #[error("Could not build provider request: {0}")]
    InvalidRequest(String),

    #[error("Provider rejected the request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Provider returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ProviderError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// True for transport-level failures where the provider was never
    /// reached or the connection broke mid-request.
    pub fn is_transport(&self) -> bool {
        matches!(self, ProviderError::Network(_))
    }
}

/// Errors from driving a job to completion.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Job failed: {reason}")]
    JobFailed { reason: String },

    #[error("Job was canceled")]
    Canceled,

    #[error("Polling timed out after {waited:?}")]
    Timeout { waited: Duration },

    #[error("Polling aborted: {0}")]
    Provider(#[from] ProviderError),
}

//! Workflow request submitted by the UI layer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::service::ServiceKind;

/// Smallest accepted upscale factor.
pub const MIN_SCALE: u32 = 2;

/// Largest accepted upscale factor.
pub const MAX_SCALE: u32 = 10;

/// Reasons a request is rejected before any external call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestValidationError {
    #[error("user_id must not be empty")]
    MissingUserId,

    #[error("{0} requires a source image")]
    MissingSourceImage(ServiceKind),

    #[error("source image reference is not a valid URL: {0}")]
    InvalidSourceImage(String),

    #[error("source image scheme '{0}' is not supported")]
    UnsupportedScheme(String),

    #[error("generate requires a non-empty prompt")]
    MissingPrompt,

    #[error("scale must be between {MIN_SCALE} and {MAX_SCALE}, got {0}")]
    ScaleOutOfRange(u32),
}

/// One user-initiated transformation request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransformRequest {
    /// Requesting user
    pub user_id: String,

    /// Which transformation to run
    pub service: ServiceKind,

    /// Source image as a remote URL or a data: URL (required for
    /// services that transform an existing image)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_image_url: Option<String>,

    /// Prompt text (required for generation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Upscale factor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,

    /// Credits this request will consume
    pub required_credits: u32,
}

impl TransformRequest {
    /// Create a request for a service, with the service's default cost.
    pub fn new(user_id: impl Into<String>, service: ServiceKind) -> Self {
        Self {
            user_id: user_id.into(),
            service,
            source_image_url: None,
            prompt: None,
            scale: None,
            required_credits: service.credit_cost(),
        }
    }

    /// Set the source image reference.
    pub fn with_source_image(mut self, url: impl Into<String>) -> Self {
        self.source_image_url = Some(url.into());
        self
    }

    /// Set the prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Set the upscale factor.
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Validate the request against its service's input contract.
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(RequestValidationError::MissingUserId);
        }

        if self.service.has_source_image() {
            let source = self
                .source_image_url
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .ok_or(RequestValidationError::MissingSourceImage(self.service))?;

            let url = Url::parse(source)
                .map_err(|_| RequestValidationError::InvalidSourceImage(source.to_string()))?;
            match url.scheme() {
                "http" | "https" | "data" => {}
                other => {
                    return Err(RequestValidationError::UnsupportedScheme(other.to_string()))
                }
            }
        }

        if matches!(self.service, ServiceKind::Generate)
            && self.prompt.as_deref().map_or(true, |p| p.trim().is_empty())
        {
            return Err(RequestValidationError::MissingPrompt);
        }

        if let Some(scale) = self.scale {
            if !(MIN_SCALE..=MAX_SCALE).contains(&scale) {
                return Err(RequestValidationError::ScaleOutOfRange(scale));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_upscale_request() {
        let request = TransformRequest::new("user-1", ServiceKind::Upscale)
            .with_source_image("https://example.com/photo.png")
            .with_scale(4);
        assert!(request.validate().is_ok());
        assert_eq!(request.required_credits, 10);
    }

    #[test]
    fn test_data_url_source_is_accepted() {
        let request = TransformRequest::new("user-1", ServiceKind::Colorize)
            .with_source_image("data:image/png;base64,aGVsbG8=");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_upscale_requires_source() {
        let request = TransformRequest::new("user-1", ServiceKind::Upscale);
        assert_eq!(
            request.validate(),
            Err(RequestValidationError::MissingSourceImage(ServiceKind::Upscale))
        );
    }

    #[test]
    fn test_generate_requires_prompt() {
        let request = TransformRequest::new("user-1", ServiceKind::Generate).with_prompt("   ");
        assert_eq!(request.validate(), Err(RequestValidationError::MissingPrompt));
    }

    #[test]
    fn test_generate_needs_no_source() {
        let request =
            TransformRequest::new("user-1", ServiceKind::Generate).with_prompt("a red fox");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_scale_bounds() {
        let request = TransformRequest::new("user-1", ServiceKind::Upscale)
            .with_source_image("https://example.com/photo.png")
            .with_scale(16);
        assert_eq!(request.validate(), Err(RequestValidationError::ScaleOutOfRange(16)));
    }

    #[test]
    fn test_rejects_file_scheme() {
        let request = TransformRequest::new("user-1", ServiceKind::Upscale)
            .with_source_image("file:///etc/passwd");
        assert_eq!(
            request.validate(),
            Err(RequestValidationError::UnsupportedScheme("file".to_string()))
        );
    }

    #[test]
    fn test_empty_user_rejected() {
        let request = TransformRequest::new("  ", ServiceKind::Generate).with_prompt("a fox");
        assert_eq!(request.validate(), Err(RequestValidationError::MissingUserId));
    }
}

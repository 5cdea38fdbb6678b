//! Usage ledger data models.
//!
//! A usage record is written once per workflow invocation and then amended
//! with artifact URLs as they become known. Amendments are partial updates;
//! fields that are not part of an amendment are never clobbered.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A metered-usage ledger row.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UsageRecord {
    /// Row ID assigned by the database
    pub id: String,

    /// User who initiated the action
    pub user_id: String,

    /// Service name ("upscale", "colorize", "generate")
    pub service_name: String,

    /// Provider job ID, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    /// Prompt text, for generation services
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Stored input artifact URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_image_url: Option<String>,

    /// Stored output artifact URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_image_url: Option<String>,

    /// Credits deducted for this action
    pub tokens_deducted: u32,

    /// When the row was created
    pub created_at: DateTime<Utc>,

    /// When the row was last updated
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a new usage record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUsageRecord {
    pub user_id: String,
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub tokens_deducted: u32,
}

impl NewUsageRecord {
    /// Create a new usage record payload.
    pub fn new(
        user_id: impl Into<String>,
        service_name: impl Into<String>,
        tokens_deducted: u32,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            service_name: service_name.into(),
            job_id: None,
            prompt: None,
            tokens_deducted,
        }
    }

    /// Set the provider job ID.
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Set the prompt if Some, otherwise no-op.
    pub fn with_optional_prompt(mut self, prompt: Option<String>) -> Self {
        if let Some(p) = prompt {
            self.prompt = Some(p);
        }
        self
    }
}

/// Partial update applied to an existing usage record.
///
/// Only fields that are `Some` are serialized, so an amendment can never
/// overwrite data written by an earlier amendment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageAmendment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_image_url: Option<String>,
}

impl UsageAmendment {
    /// Create an empty amendment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider job ID.
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Set the stored input artifact URL.
    pub fn with_input_image_url(mut self, url: impl Into<String>) -> Self {
        self.input_image_url = Some(url.into());
        self
    }

    /// Set the stored output artifact URL.
    pub fn with_output_image_url(mut self, url: impl Into<String>) -> Self {
        self.output_image_url = Some(url.into());
        self
    }

    /// True if no field is set.
    pub fn is_empty(&self) -> bool {
        self.job_id.is_none() && self.input_image_url.is_none() && self.output_image_url.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amendment_serializes_only_set_fields() {
        let amendment = UsageAmendment::new().with_output_image_url("https://storage/img.png");
        let json = serde_json::to_value(&amendment).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(obj.len(), 1);
        assert_eq!(
            obj.get("output_image_url").and_then(|v| v.as_str()),
            Some("https://storage/img.png")
        );
        assert!(!obj.contains_key("input_image_url"));
        assert!(!obj.contains_key("job_id"));
    }

    #[test]
    fn test_amendment_is_empty() {
        assert!(UsageAmendment::new().is_empty());
        assert!(!UsageAmendment::new().with_job_id("p1").is_empty());
    }

    #[test]
    fn test_new_usage_record_builder() {
        let record = NewUsageRecord::new("user-1", "upscale", 10)
            .with_job_id("p1")
            .with_optional_prompt(None);

        assert_eq!(record.tokens_deducted, 10);
        assert_eq!(record.job_id.as_deref(), Some("p1"));
        assert!(record.prompt.is_none());
    }
}

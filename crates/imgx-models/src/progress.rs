//! Progress events streamed to the caller while a job runs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{Job, JobStatus};

/// One status observation, delivered once per status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressEvent {
    /// Observed status
    pub status: JobStatus,

    /// Output URL, present on the terminal succeeded event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Provider error message, present on the terminal failed event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    /// True if this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl From<&Job> for ProgressEvent {
    fn from(job: &Job) -> Self {
        Self {
            status: job.status,
            output: job.output.clone(),
            error: job.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobId;

    #[test]
    fn test_event_from_job() {
        let job = Job {
            id: JobId::from_string("p1"),
            status: JobStatus::Succeeded,
            input: None,
            output: Some("https://provider/img.png".to_string()),
            error: None,
        };
        let event = ProgressEvent::from(&job);
        assert_eq!(event.status, JobStatus::Succeeded);
        assert!(event.is_terminal());
        assert_eq!(event.output.as_deref(), Some("https://provider/img.png"));
    }
}

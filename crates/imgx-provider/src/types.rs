//! Wire types for the provider's predictions API.
//!
//! Responses are duck-typed JSON on the wire; they are converted into the
//! shared [`Job`] model here, and anything with an unknown status tag or a
//! malformed payload is rejected instead of being trusted downstream.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use imgx_models::{Job, JobId, JobStatus, ServiceKind, TransformRequest};

use crate::error::ProviderError;

/// Default upscale factor when the request does not specify one.
const DEFAULT_SCALE: u32 = 4;

/// Body of `POST /predictions`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    /// Pinned model version
    pub version: String,
    /// Model input parameters
    pub input: Value,
}

impl SubmitRequest {
    /// Build the provider payload for a validated transformation request.
    pub fn for_request(request: &TransformRequest) -> Result<Self, ProviderError> {
        let input = match request.service {
            ServiceKind::Upscale => {
                let image = request.source_image_url.as_deref().ok_or_else(|| {
                    ProviderError::invalid_request("upscale request has no source image")
                })?;
                json!({
                    "image": image,
                    "scale": request.scale.unwrap_or(DEFAULT_SCALE),
                    "face_enhance": false,
                })
            }
            ServiceKind::Colorize => {
                let image = request.source_image_url.as_deref().ok_or_else(|| {
                    ProviderError::invalid_request("colorize request has no source image")
                })?;
                json!({ "image": image })
            }
            ServiceKind::Generate => {
                let prompt = request.prompt.as_deref().ok_or_else(|| {
                    ProviderError::invalid_request("generate request has no prompt")
                })?;
                json!({ "prompt": prompt })
            }
        };

        Ok(Self {
            version: request.service.model_version().to_string(),
            input,
        })
    }
}

/// Raw prediction payload as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl TryFrom<PredictionResponse> for Job {
    type Error = ProviderError;

    fn try_from(raw: PredictionResponse) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::invalid_response("prediction has no id"))?;

        let status_tag = raw
            .status
            .ok_or_else(|| ProviderError::invalid_response("prediction has no status"))?;
        let status = JobStatus::from_str(&status_tag).ok_or_else(|| {
            ProviderError::invalid_response(format!("unknown prediction status '{status_tag}'"))
        })?;

        Ok(Job {
            id: JobId::from_string(id),
            status,
            input: raw.input,
            output: normalize_output(raw.output)?,
            error: raw.error.map(|e| match e {
                Value::String(s) => s,
                other => other.to_string(),
            }),
        })
    }
}

/// Flatten the provider's output field to a single URL.
///
/// Single-output models return a string; multi-output models return an
/// array of URLs, of which the last is the final image.
fn normalize_output(output: Option<Value>) -> Result<Option<String>, ProviderError> {
    match output {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(url)) => Ok(Some(url)),
        Some(Value::Array(items)) => match items.last() {
            None => Ok(None),
            Some(Value::String(url)) => Ok(Some(url.clone())),
            Some(other) => Err(ProviderError::invalid_response(format!(
                "prediction output array holds a non-string entry: {other}"
            ))),
        },
        Some(other) => Err(ProviderError::invalid_response(format!(
            "prediction output has an unexpected shape: {other}"
        ))),
    }
}

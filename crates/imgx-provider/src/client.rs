//! Provider HTTP client.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use imgx_models::{Job, JobId};

use crate::error::{ProviderError, ProviderResult};
use crate::types::{PredictionResponse, SubmitRequest};

/// Configuration for the provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the predictions API
    pub base_url: String,
    /// API token sent with every request
    pub api_token: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.replicate.com/v1".to_string(),
            api_token: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ProviderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            base_url: std::env::var("PROVIDER_API_URL")
                .unwrap_or_else(|_| "https://api.replicate.com/v1".to_string()),
            api_token: std::env::var("PROVIDER_API_TOKEN")
                .map_err(|_| ProviderError::config_error("PROVIDER_API_TOKEN not set"))?,
            timeout: Duration::from_secs(
                std::env::var("PROVIDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

/// Client for the inference provider's predictions API.
///
/// Every method performs exactly one attempt; callers own any retry
/// policy.
#[derive(Clone)]
pub struct ProviderClient {
    http: Client,
    config: ProviderConfig,
}

impl ProviderClient {
    /// Create a new provider client.
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ProviderResult<Self> {
        Self::new(ProviderConfig::from_env()?)
    }

    /// Submit a new prediction. Returns the job in its initial state.
    pub async fn submit(&self, request: &SubmitRequest) -> ProviderResult<Job> {
        let url = format!("{}/predictions", self.config.base_url);
        debug!(version = %request.version, "Submitting prediction to {}", url);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Token {}", self.config.api_token))
            .json(request)
            .send()
            .await
            .map_err(ProviderError::Network)?;

        let job = self.parse_prediction(response).await?;

        // The provider can accept the request yet hand back an error
        // payload on create; surface it as a rejection.
        if let Some(error) = &job.error {
            if !job.status.is_terminal() {
                return Err(ProviderError::Rejected {
                    status: 200,
                    detail: error.clone(),
                });
            }
        }

        debug!(job_id = %job.id, status = %job.status, "Prediction submitted");
        Ok(job)
    }

    /// Fetch the current state of a prediction.
    pub async fn fetch(&self, id: &JobId) -> ProviderResult<Job> {
        let url = format!("{}/predictions/{}", self.config.base_url, id);

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Token {}", self.config.api_token))
            .send()
            .await
            .map_err(ProviderError::Network)?;

        self.parse_prediction(response).await
    }

    /// Validate an HTTP response into a [`Job`].
    async fn parse_prediction(&self, response: reqwest::Response) -> ProviderResult<Job> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let raw: PredictionResponse = response.json().await.map_err(ProviderError::Network)?;
        raw.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgx_models::{JobStatus, ServiceKind, TransformRequest};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> ProviderClient {
        ProviderClient::new(ProviderConfig {
            base_url: base_url.to_string(),
            api_token: "test-token".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = ProviderConfig::default();
        assert_eq!(config.base_url, "https://api.replicate.com/v1");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_submit_returns_starting_job() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predictions"))
            .and(header("Authorization", "Token test-token"))
            .and(body_partial_json(json!({"input": {"prompt": "a fox"}})))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"id": "p1", "status": "starting"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let request = TransformRequest::new("user-1", ServiceKind::Generate).with_prompt("a fox");
        let submit = SubmitRequest::for_request(&request).unwrap();

        let job = client.submit(&submit).await.unwrap();
        assert_eq!(job.id.as_str(), "p1");
        assert_eq!(job.status, JobStatus::Starting);
    }

    #[tokio::test]
    async fn test_submit_maps_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predictions"))
            .respond_with(
                ResponseTemplate::new(422).set_body_string("invalid version"),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let request = TransformRequest::new("user-1", ServiceKind::Generate).with_prompt("a fox");
        let submit = SubmitRequest::for_request(&request).unwrap();

        let err = client.submit(&submit).await.unwrap_err();
        match err {
            ProviderError::Rejected { status, detail } => {
                assert_eq!(status, 422);
                assert_eq!(detail, "invalid version");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_surfaces_error_payload_on_create() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predictions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "p1",
                "status": "starting",
                "error": "version not permitted",
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let request = TransformRequest::new("user-1", ServiceKind::Generate).with_prompt("a fox");
        let submit = SubmitRequest::for_request(&request).unwrap();

        assert!(matches!(
            client.submit(&submit).await,
            Err(ProviderError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_rejects_unknown_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/predictions/p1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "p1", "status": "booting"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.fetch(&JobId::from_string("p1")).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}

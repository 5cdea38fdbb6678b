//! PostgREST client for the usage database.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};

/// Request timeout for database calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the database client.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project base URL (without the /rest/v1 suffix)
    pub base_url: String,
    /// Service role API key
    pub api_key: String,
}

impl SupabaseConfig {
    /// Create config from environment variables.
    pub fn from_env() -> LedgerResult<Self> {
        Ok(Self {
            base_url: std::env::var("SUPABASE_URL")
                .map_err(|_| LedgerError::config_error("SUPABASE_URL not set"))?,
            api_key: std::env::var("SUPABASE_SERVICE_KEY")
                .map_err(|_| LedgerError::config_error("SUPABASE_SERVICE_KEY not set"))?,
        })
    }
}

/// Thin client over the PostgREST API.
///
/// Repositories ([`crate::credits::CreditLedger`],
/// [`crate::usage::UsageRecorder`]) own table knowledge; this client only
/// speaks HTTP.
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
}

impl SupabaseClient {
    /// Create a new client from configuration.
    pub fn new(config: SupabaseConfig) -> LedgerResult<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| LedgerError::config_error("API key contains invalid characters"))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| LedgerError::config_error("API key contains invalid characters"))?;
        headers.insert("apikey", key);
        headers.insert(reqwest::header::AUTHORIZATION, bearer);

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(LedgerError::Network)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> LedgerResult<Self> {
        Self::new(SupabaseConfig::from_env()?)
    }

    /// Insert a row and return the inserted representation.
    pub async fn insert<T: Serialize + ?Sized>(
        &self,
        table: &str,
        row: &T,
    ) -> LedgerResult<Vec<Value>> {
        let url = format!("{}/rest/v1/{}", self.base_url, table);
        debug!("Inserting into {}", table);

        let response = self
            .http
            .post(&url)
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await
            .map_err(LedgerError::Network)?;

        let rows: Vec<Value> = Self::check(response).await?.json().await?;
        Ok(rows)
    }

    /// Partially update a row by primary key. Only the fields present in
    /// `patch` are written.
    pub async fn update<T: Serialize + ?Sized>(
        &self,
        table: &str,
        id: &str,
        patch: &T,
    ) -> LedgerResult<()> {
        let url = format!("{}/rest/v1/{}?id=eq.{}", self.base_url, table, id);
        debug!("Updating {} row {}", table, id);

        let response = self
            .http
            .patch(&url)
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await
            .map_err(LedgerError::Network)?;

        Self::check(response).await?;
        Ok(())
    }

    /// Fetch at most one row matching `column = value`.
    pub async fn select_one(
        &self,
        table: &str,
        column: &str,
        value: &str,
        columns: &str,
    ) -> LedgerResult<Option<Value>> {
        let url = format!(
            "{}/rest/v1/{}?{}=eq.{}&select={}&limit=1",
            self.base_url, table, column, value, columns
        );

        let response = self.http.get(&url).send().await.map_err(LedgerError::Network)?;
        let mut rows: Vec<Value> = Self::check(response).await?.json().await?;

        if rows.is_empty() {
            Ok(None)
        } else {
            Ok(Some(rows.remove(0)))
        }
    }

    /// Call a stored procedure through the RPC endpoint.
    pub async fn rpc<T: Serialize + ?Sized>(
        &self,
        function: &str,
        args: &T,
    ) -> LedgerResult<Value> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, function);
        debug!("Calling database function {}", function);

        let response = self
            .http
            .post(&url)
            .json(args)
            .send()
            .await
            .map_err(LedgerError::Network)?;

        let value: Value = Self::check(response).await?.json().await?;
        Ok(value)
    }

    /// Map non-2xx responses to [`LedgerError::RequestFailed`].
    async fn check(response: reqwest::Response) -> LedgerResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(LedgerError::RequestFailed {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(base_url: &str) -> SupabaseClient {
        SupabaseClient::new(SupabaseConfig {
            base_url: base_url.to_string(),
            api_key: "service-key".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_sends_auth_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/service_usage"))
            .and(header("apikey", "service-key"))
            .and(header("Authorization", "Bearer service-key"))
            .and(header("Prefer", "return=representation"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": "u1"}])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let rows = client
            .insert("service_usage", &json!({"user_id": "user-1"}))
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], "u1");
    }

    #[tokio::test]
    async fn test_select_one_returns_none_for_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("user_id", "eq.missing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let row = client
            .select_one("profiles", "user_id", "missing", "credits")
            .await
            .unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn test_non_2xx_maps_to_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/service_usage"))
            .respond_with(ResponseTemplate::new(401).set_body_string("permission denied"))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let err = client
            .update("service_usage", "u1", &json!({"job_id": "p1"}))
            .await
            .unwrap_err();
        match err {
            LedgerError::RequestFailed { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "permission denied");
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    }
}

//! Usage record repository.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use imgx_models::{NewUsageRecord, UsageAmendment, UsageRecord};

use crate::client::SupabaseClient;
use crate::error::{LedgerError, LedgerResult};

/// Table holding one row per user-initiated billable action.
const USAGE_TABLE: &str = "service_usage";

/// Repository for usage ledger rows.
pub struct UsageRecorder {
    client: SupabaseClient,
}

impl UsageRecorder {
    /// Create a new usage recorder.
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Insert a usage record and return the stored row.
    ///
    /// Used directly for zero-cost services; paid services insert their
    /// row through the ledger's atomic deduction instead.
    pub async fn create(&self, usage: &NewUsageRecord) -> LedgerResult<UsageRecord> {
        let rows = self.client.insert(USAGE_TABLE, usage).await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::invalid_response("insert returned no rows"))?;
        let record: UsageRecord = serde_json::from_value(row)
            .map_err(|e| LedgerError::invalid_response(format!("bad usage row: {e}")))?;

        info!(
            user_id = %record.user_id,
            usage_id = %record.id,
            service = %record.service_name,
            "Recorded service usage"
        );
        Ok(record)
    }

    /// Apply a partial update to an existing usage record.
    ///
    /// Only the fields set on the amendment are written; everything else
    /// keeps its stored value. An empty amendment is a no-op.
    pub async fn amend(&self, usage_id: &str, amendment: &UsageAmendment) -> LedgerResult<()> {
        if amendment.is_empty() {
            debug!(usage_id = %usage_id, "Skipping empty usage amendment");
            return Ok(());
        }

        let mut patch = serde_json::to_value(amendment)?;
        if let Value::Object(fields) = &mut patch {
            fields.insert(
                "updated_at".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }

        self.client.update(USAGE_TABLE, usage_id, &patch).await?;
        debug!(usage_id = %usage_id, "Amended usage record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SupabaseConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn recorder_for(base_url: &str) -> UsageRecorder {
        UsageRecorder::new(
            SupabaseClient::new(SupabaseConfig {
                base_url: base_url.to_string(),
                api_key: "service-key".to_string(),
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_create_parses_inserted_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/service_usage"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
                "id": "u1",
                "user_id": "user-1",
                "service_name": "colorize",
                "job_id": null,
                "prompt": null,
                "input_image_url": null,
                "output_image_url": null,
                "tokens_deducted": 0,
                "created_at": "2025-01-01T00:00:00Z",
                "updated_at": "2025-01-01T00:00:00Z",
            }])))
            .mount(&server)
            .await;

        let recorder = recorder_for(&server.uri());
        let record = recorder
            .create(&NewUsageRecord::new("user-1", "colorize", 0))
            .await
            .unwrap();

        assert_eq!(record.id, "u1");
        assert_eq!(record.tokens_deducted, 0);
    }

    #[tokio::test]
    async fn test_amend_writes_only_set_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/service_usage"))
            .and(query_param("id", "eq.u1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let recorder = recorder_for(&server.uri());
        recorder
            .amend(
                "u1",
                &UsageAmendment::new().with_output_image_url("https://cdn.example.com/out.png"),
            )
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let patch: &Request = &requests[0];
        let body: Value = serde_json::from_slice(&patch.body).unwrap();
        let fields = body.as_object().unwrap();

        assert_eq!(
            fields.get("output_image_url").and_then(Value::as_str),
            Some("https://cdn.example.com/out.png")
        );
        assert!(fields.contains_key("updated_at"));
        assert!(!fields.contains_key("input_image_url"));
        assert!(!fields.contains_key("job_id"));
    }

    #[tokio::test]
    async fn test_empty_amendment_skips_the_request() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/service_usage"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let recorder = recorder_for(&server.uri());
        recorder.amend("u1", &UsageAmendment::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_with_no_returned_rows_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/service_usage"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .mount(&server)
            .await;

        let recorder = recorder_for(&server.uri());
        let err = recorder
            .create(&NewUsageRecord::new("user-1", "colorize", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidResponse(_)));
    }
}

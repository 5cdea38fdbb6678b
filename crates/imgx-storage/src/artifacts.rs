//! Artifact archiving.
//!
//! Provider outputs and user uploads start life as transient references: a
//! short-lived provider URL or a `data:` URL from the browser. The
//! artifact store copies those bytes into the bucket under a logical name
//! and hands back the stable public URL.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, info};

use crate::client::StorageClient;
use crate::error::{StorageError, StorageResult};

/// Timeout for fetching source bytes over HTTP.
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Content type assumed when the source does not declare one.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Copies transient artifacts into durable storage.
pub struct ArtifactStore {
    http: reqwest::Client,
    storage: StorageClient,
}

impl ArtifactStore {
    /// Create an artifact store over a storage client.
    pub fn new(storage: StorageClient) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| StorageError::config_error(e.to_string()))?;

        Ok(Self { http, storage })
    }

    /// Persist the bytes behind `source_url` under `logical_name`.
    ///
    /// Re-persisting the same name overwrites the stored object, so the
    /// call is safe to repeat. Returns the stable public URL.
    pub async fn persist(&self, source_url: &str, logical_name: &str) -> StorageResult<String> {
        debug!("Persisting {} as {}", summarize(source_url), logical_name);

        let (bytes, content_type) = self.fetch_source(source_url).await?;
        self.storage
            .put_object(logical_name, bytes, &content_type)
            .await?;

        let url = self.storage.public_url(logical_name);
        info!("Persisted artifact {} -> {}", logical_name, url);
        Ok(url)
    }

    /// Resolve a source reference to raw bytes and a content type.
    async fn fetch_source(&self, source_url: &str) -> StorageResult<(Vec<u8>, String)> {
        if source_url.starts_with("data:") {
            return decode_data_url(source_url);
        }

        let response = self
            .http
            .get(source_url)
            .send()
            .await
            .map_err(|e| StorageError::fetch_failed(source_url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::fetch_failed(
                source_url,
                format!("status {status}"),
            ));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StorageError::fetch_failed(source_url, e.to_string()))?;

        Ok((bytes.to_vec(), content_type))
    }
}

/// Decode a base64 `data:` URL into bytes and a content type.
fn decode_data_url(url: &str) -> StorageResult<(Vec<u8>, String)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| StorageError::invalid_source("missing data: prefix"))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| StorageError::invalid_source("data: URL has no payload separator"))?;

    let Some(media_type) = header.strip_suffix(";base64") else {
        return Err(StorageError::invalid_source(
            "only base64-encoded data: URLs are supported",
        ));
    };

    let content_type = if media_type.is_empty() {
        DEFAULT_CONTENT_TYPE.to_string()
    } else {
        media_type.to_string()
    };

    let bytes = BASE64
        .decode(payload)
        .map_err(|e| StorageError::invalid_source(format!("invalid base64 payload: {e}")))?;

    Ok((bytes, content_type))
}

/// Data URLs can embed whole images; keep log lines short.
fn summarize(source_url: &str) -> &str {
    let end = source_url
        .char_indices()
        .nth(64)
        .map(|(i, _)| i)
        .unwrap_or(source_url.len());
    &source_url[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StorageConfig;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store_for(endpoint: &str) -> ArtifactStore {
        let storage = StorageClient::new(StorageConfig {
            endpoint_url: endpoint.to_string(),
            access_key_id: "test-key".to_string(),
            secret_access_key: "test-secret".to_string(),
            bucket_name: "images".to_string(),
            region: "auto".to_string(),
            public_base_url: "https://cdn.example.com".to_string(),
        })
        .await
        .unwrap();
        ArtifactStore::new(storage).unwrap()
    }

    #[test]
    fn test_decode_data_url() {
        let (bytes, content_type) = decode_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(content_type, "image/png");
    }

    #[test]
    fn test_decode_data_url_defaults_content_type() {
        let (_, content_type) = decode_data_url("data:;base64,aGVsbG8=").unwrap();
        assert_eq!(content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_decode_rejects_plain_data_url() {
        assert!(matches!(
            decode_data_url("data:text/plain,hello"),
            Err(StorageError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(
            decode_data_url("data:image/png;base64,???"),
            Err(StorageError::InvalidSource(_))
        ));
    }

    #[tokio::test]
    async fn test_persist_data_url_uploads_decoded_bytes() {
        let bucket = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/images/p1_in_1.png"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&bucket)
            .await;

        let store = store_for(&bucket.uri()).await;
        let url = store
            .persist("data:image/png;base64,aGVsbG8=", "p1_in_1.png")
            .await
            .unwrap();

        assert_eq!(url, "https://cdn.example.com/p1_in_1.png");
    }

    #[tokio::test]
    async fn test_persist_remote_url_roundtrip() {
        let source = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/out.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"image-bytes".to_vec())
                    .insert_header("content-type", "image/png"),
            )
            .mount(&source)
            .await;

        let bucket = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/images/p1_out_1.png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&bucket)
            .await;

        let store = store_for(&bucket.uri()).await;
        let url = store
            .persist(&format!("{}/out.png", source.uri()), "p1_out_1.png")
            .await
            .unwrap();

        assert_eq!(url, "https://cdn.example.com/p1_out_1.png");
    }

    #[tokio::test]
    async fn test_persist_is_repeatable_with_same_url() {
        let bucket = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/images/p1_in_1.png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&bucket)
            .await;

        let store = store_for(&bucket.uri()).await;
        let first = store
            .persist("data:image/png;base64,aGVsbG8=", "p1_in_1.png")
            .await
            .unwrap();
        let second = store
            .persist("data:image/png;base64,aGVsbG8=", "p1_in_1.png")
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_persist_surfaces_fetch_failure() {
        let source = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&source)
            .await;

        let bucket = MockServer::start().await;
        let store = store_for(&bucket.uri()).await;

        let err = store
            .persist(&format!("{}/gone.png", source.uri()), "x.png")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::FetchFailed { .. }));
    }
}

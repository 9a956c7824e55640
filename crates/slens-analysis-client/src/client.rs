//! Analysis service HTTP client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};
use crate::metrics::record_request;
use crate::transport::{ChunkUploader, StatusSource};
use crate::types::{ChunkUpload, HealthResponse, RemoteStatus, StatusResponse, UploadResponse};

/// Configuration for the analysis client.
#[derive(Debug, Clone)]
pub struct AnalysisClientConfig {
    /// Base URL of the analysis service
    pub base_url: String,
    /// Request timeout (covers a full chunk upload)
    pub timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl Default for AnalysisClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout: Duration::from_secs(300), // 50 MiB chunks on slow links
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl AnalysisClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ANALYSIS_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:5000".to_string()),
            timeout: Duration::from_secs(
                std::env::var("ANALYSIS_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            connect_timeout: Duration::from_secs(
                std::env::var("ANALYSIS_SERVICE_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

/// Client for the remote analysis worker.
pub struct AnalysisClient {
    http: Client,
    config: AnalysisClientConfig,
}

impl AnalysisClient {
    /// Create a new analysis client.
    pub fn new(config: AnalysisClientConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(AnalysisClientConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Check if the analysis service is healthy.
    pub async fn health_check(&self) -> ClientResult<bool> {
        let url = self.url("/health");

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Analysis service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Analysis service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Upload one chunk as `multipart/form-data`.
    pub async fn send_chunk(&self, chunk: &ChunkUpload) -> ClientResult<UploadResponse> {
        let url = self.url("/analysis");
        let bytes = tokio::fs::read(&chunk.part_path).await?;
        let metadata = serde_json::to_string(&chunk.metadata)?;

        debug!(
            chunk_index = chunk.chunk_index,
            total_chunks = chunk.total_chunks,
            bytes = bytes.len(),
            "Uploading chunk to {}",
            url
        );

        let video = Part::bytes(bytes)
            .file_name(format!(
                "{}.part{}",
                chunk.original_filename, chunk.chunk_index
            ))
            .mime_str("application/octet-stream")?;

        let form = Form::new()
            .part("video", video)
            .text("metadata", metadata)
            .text("chunk_index", chunk.chunk_index.to_string())
            .text("total_chunks", chunk.total_chunks.to_string())
            .text("original_filename", chunk.original_filename.clone());

        let start = Instant::now();
        let response = match self.http.post(&url).multipart(form).send().await {
            Ok(r) => r,
            Err(e) => {
                record_request("upload_chunk", 0, elapsed_ms(start));
                return Err(ClientError::Network(e));
            }
        };

        let status = response.status();
        record_request("upload_chunk", status.as_u16(), elapsed_ms(start));

        let body = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::request_failed(status.as_u16(), body));
        }

        if body.trim().is_empty() {
            return Ok(UploadResponse::default());
        }

        serde_json::from_str(&body).map_err(|e| {
            ClientError::invalid_response(format!("chunk upload response: {}", e))
        })
    }

    /// Query the status of a remote job.
    pub async fn get_status(&self, correlation_id: &str) -> ClientResult<RemoteStatus> {
        let url = self.url(&format!("/result/{}", correlation_id));

        let start = Instant::now();
        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                record_request("get_status", 0, elapsed_ms(start));
                return Err(ClientError::Network(e));
            }
        };

        let status = response.status();
        record_request("get_status", status.as_u16(), elapsed_ms(start));

        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            // Some deployments answer unknown ids with a bare 404.
            return Ok(serde_json::from_str::<StatusResponse>(&body)
                .map(RemoteStatus::from)
                .unwrap_or(RemoteStatus::NotFound));
        }

        if !status.is_success() {
            return Err(ClientError::request_failed(status.as_u16(), body));
        }

        let parsed: StatusResponse = serde_json::from_str(&body)
            .map_err(|e| ClientError::invalid_response(format!("status response: {}", e)))?;

        Ok(parsed.into())
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[async_trait]
impl ChunkUploader for AnalysisClient {
    async fn upload_chunk(&self, chunk: &ChunkUpload) -> ClientResult<UploadResponse> {
        self.send_chunk(chunk).await
    }
}

#[async_trait]
impl StatusSource for AnalysisClient {
    async fn fetch_status(&self, correlation_id: &str) -> ClientResult<RemoteStatus> {
        self.get_status(correlation_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AnalysisClient {
        AnalysisClient::new(AnalysisClientConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    fn chunk_in(dir: &tempfile::TempDir, index: u32, total: u32) -> ChunkUpload {
        let part_path = dir.path().join(format!("part-{}", index));
        std::fs::write(&part_path, b"chunk-bytes").unwrap();
        ChunkUpload {
            part_path,
            len: 11,
            chunk_index: index,
            total_chunks: total,
            original_filename: "pitch_rehearsal".to_string(),
            metadata: ChunkMetadata {
                target_time: Some("05:00".parse().unwrap()),
            },
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = AnalysisClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.timeout, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_upload_chunk_sends_multipart_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analysis"))
            .and(body_string_contains("name=\"chunk_index\""))
            .and(body_string_contains("name=\"total_chunks\""))
            .and(body_string_contains("name=\"original_filename\""))
            .and(body_string_contains("pitch_rehearsal"))
            .and(body_string_contains(r#"{"target_time":"05:00"}"#))
            .and(body_string_contains("chunk-bytes"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "job_id": "remote-7" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let response = client_for(&server)
            .upload_chunk(&chunk_in(&dir, 0, 1))
            .await
            .unwrap();

        assert_eq!(response.correlation_id(), Some("remote-7"));
    }

    #[tokio::test]
    async fn test_upload_chunk_without_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analysis"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "message": "ok" })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let response = client_for(&server)
            .upload_chunk(&chunk_in(&dir, 1, 3))
            .await
            .unwrap();

        assert_eq!(response.correlation_id(), None);
    }

    #[tokio::test]
    async fn test_upload_chunk_non_2xx_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analysis"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = client_for(&server)
            .upload_chunk(&chunk_in(&dir, 0, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::RequestFailed { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_get_status_variants() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/result/done"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "completed",
                "result": { "intensity_db": 65.5 }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/result/busy"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "processing" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/result/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);

        match client.fetch_status("done").await.unwrap() {
            RemoteStatus::Completed(payload) => assert_eq!(payload["intensity_db"], 65.5),
            other => panic!("unexpected status: {:?}", other),
        }
        assert_eq!(client.fetch_status("busy").await.unwrap(), RemoteStatus::Processing);
        assert_eq!(client.fetch_status("gone").await.unwrap(), RemoteStatus::NotFound);
    }

    #[tokio::test]
    async fn test_get_status_garbage_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/result/x"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_status("x").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "ok" })))
            .mount(&server)
            .await;

        assert!(client_for(&server).health_check().await.unwrap());
    }
}

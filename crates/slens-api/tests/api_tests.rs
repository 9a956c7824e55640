//! API integration tests.
//!
//! The remote analysis worker is a wiremock server; the pipeline runs for
//! real against it with in-memory stores.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use slens_analysis_client::{AnalysisClient, AnalysisClientConfig};
use slens_api::{create_router, ApiConfig, AppState};
use slens_pipeline::{BroadcastNotificationSink, JobOrchestrator, PipelineConfig};
use slens_store::{InMemoryJobStore, InMemorySubjectRecords};

struct TestApp {
    router: Router,
    _work: TempDir,
    media_dir: TempDir,
}

impl TestApp {
    fn new(worker_url: &str) -> Self {
        let work = TempDir::new().unwrap();
        let media_dir = TempDir::new().unwrap();

        let analysis = Arc::new(
            AnalysisClient::new(AnalysisClientConfig {
                base_url: worker_url.to_string(),
                timeout: Duration::from_secs(5),
                connect_timeout: Duration::from_secs(1),
            })
            .unwrap(),
        );

        let pipeline = PipelineConfig {
            chunk_size: 1024,
            poll_interval: Duration::from_millis(10),
            max_poll_attempts: 50,
            work_dir: work.path().to_path_buf(),
            ..PipelineConfig::default()
        };

        let orchestrator = JobOrchestrator::new(
            &pipeline,
            Arc::new(InMemoryJobStore::new()),
            Arc::new(InMemorySubjectRecords::new()),
            analysis.clone(),
            analysis.clone(),
            Arc::new(BroadcastNotificationSink::default()),
        );

        let state = AppState::from_parts(ApiConfig::default(), orchestrator, analysis);

        Self {
            router: create_router(state, None),
            _work: work,
            media_dir,
        }
    }

    fn media(&self, len: usize) -> PathBuf {
        let path = self.media_dir.path().join("town-hall.mp4");
        std::fs::write(&path, vec![3u8; len]).unwrap();
        path
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn submit(&self, media: &PathBuf) -> String {
        let (status, body) = self
            .post_json(
                "/api/jobs",
                json!({
                    "subject_id": "presentation-1",
                    "subject_title": "Town hall",
                    "owner_id": "user-1",
                    "media_path": media,
                    "target_time": "04:30",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED, "{}", body);
        assert_eq!(body["state"], "PENDING");
        body["job_id"].as_str().unwrap().to_string()
    }

    async fn wait_for_state(&self, job_id: &str, state: &str) -> Value {
        for _ in 0..500 {
            let (status, body) = self.get(&format!("/api/jobs/{}", job_id)).await;
            assert_eq!(status, StatusCode::OK);
            if body["state"] == state {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never reached {}", job_id, state);
    }
}

async fn worker_with_status(status: Value) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analysis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "job_id": "remote-1" })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/result/remote-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "healthy" })))
        .mount(&server)
        .await;

    server
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new("http://127.0.0.1:1");

    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_disabled_is_not_found() {
    let app = TestApp::new("http://127.0.0.1:1");
    let (status, _) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_request_id_header() {
    let app = TestApp::new("http://127.0.0.1:1");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Request-ID", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["X-Request-ID"], "req-123");
    assert_eq!(response.headers()["X-Content-Type-Options"], "nosniff");
}

#[tokio::test]
async fn test_ready_with_healthy_worker() {
    let server = worker_with_status(json!({ "status": "processing" })).await;
    let app = TestApp::new(&server.uri());

    let (status, body) = app.get("/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["analysis_service"]["status"], "ok");
}

#[tokio::test]
async fn test_ready_with_unreachable_worker() {
    let app = TestApp::new("http://127.0.0.1:1");

    let (status, body) = app.get("/ready").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["job_store"]["status"], "ok");
    assert_eq!(body["checks"]["analysis_service"]["status"], "error");
}

#[tokio::test]
async fn test_completed_job_flow() {
    let server = worker_with_status(json!({
        "status": "completed",
        "result": { "intensity_db": 65.5, "pace": { "wpm": 142 } }
    }))
    .await;
    let app = TestApp::new(&server.uri());
    let media = app.media(2500);

    let job_id = app.submit(&media).await;
    let status = app.wait_for_state(&job_id, "COMPLETED").await;
    assert_eq!(status["subject_id"], "presentation-1");
    assert_eq!(status["message"], "Analysis complete");

    let (code, body) = app.get(&format!("/api/jobs/{}/result", job_id)).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["result"]["intensity_db"], 65.5);
    assert_eq!(body["result"]["pace"]["wpm"], 142);

    // 2500 bytes in 1024-byte chunks
    let uploads = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/analysis")
        .count();
    assert_eq!(uploads, 3);

    let (_, body) = app.get("/api/cache/size").await;
    assert_eq!(body["size"], 1);

    let (code, body) = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri("/api/cache")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["removed"], 1);
    assert_eq!(body["size"], 0);

    let (code, body) = app.get(&format!("/api/jobs/{}/result", job_id)).await;
    assert_eq!(code, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("no result"));
}

#[tokio::test]
async fn test_remote_failure_flow() {
    let server = worker_with_status(json!({
        "status": "error",
        "error": "decode failed"
    }))
    .await;
    let app = TestApp::new(&server.uri());
    let media = app.media(100);

    let job_id = app.submit(&media).await;
    let status = app.wait_for_state(&job_id, "FAILED").await;
    assert!(status["message"].as_str().unwrap().contains("decode failed"));

    let (code, _) = app.get(&format!("/api/jobs/{}/result", job_id)).await;
    assert_eq!(code, StatusCode::NOT_FOUND);

    let (_, body) = app.get("/api/cache/size").await;
    assert_eq!(body["size"], 0);

    let (code, body) = app
        .get("/api/jobs/purgeable?older_than_secs=0")
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["jobs"][0]["id"], job_id.as_str());
}

#[tokio::test]
async fn test_cancel_processing_job() {
    let server = worker_with_status(json!({ "status": "processing" })).await;
    let app = TestApp::new(&server.uri());
    let media = app.media(100);

    let job_id = app.submit(&media).await;
    app.wait_for_state(&job_id, "PROCESSING").await;

    let (code, body) = app
        .post_json(&format!("/api/jobs/{}/cancel", job_id), json!({}))
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["cancelled"], true);

    let (code, body) = app
        .get("/api/jobs/stuck?older_than_secs=0")
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["jobs"][0]["state"], "PROCESSING");
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let app = TestApp::new("http://127.0.0.1:1");

    for uri in ["/api/jobs/missing", "/api/jobs/missing/result"] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["detail"].as_str().unwrap().contains("missing"));
    }

    let (status, _) = app.post_json("/api/jobs/missing/cancel", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submit_validation() {
    let app = TestApp::new("http://127.0.0.1:1");
    let media = app.media(100);

    let (status, body) = app
        .post_json(
            "/api/jobs",
            json!({
                "subject_id": "presentation-1",
                "owner_id": "user-1",
                "media_path": media,
                "target_time": "4m30s",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("target_time"));

    let (status, _) = app
        .post_json(
            "/api/jobs",
            json!({
                "subject_id": "presentation-1",
                "owner_id": "user-1",
                "media_path": "/nonexistent/slens/talk.mp4",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/api/jobs/stuck?older_than_secs=-5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unreachable_worker_leaves_advisory() {
    let app = TestApp::new("http://127.0.0.1:1");
    let media = app.media(100);

    let job_id = app.submit(&media).await;
    let status = app.wait_for_state(&job_id, "PROCESSING").await;

    assert!(status["advisory"].as_str().unwrap().contains("starting up"));
}

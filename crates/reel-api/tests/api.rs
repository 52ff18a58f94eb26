//! HTTP surface tests against the in-memory orchestrator.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use reel_api::{create_router, ApiConfig, AppState};
use reel_models::{JobId, JobStatus};
use reel_worker::testing::TestHarness;
use reel_worker::Orchestrator;
use serde_json::{json, Value};
use tower::ServiceExt;

const SOURCE_URL: &str = "https://shop.example.com/products/trail-runner-2";

fn app(orchestrator: &Orchestrator, config: ApiConfig) -> Router {
    create_router(AppState::new(config, orchestrator.clone()), None)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_submit_then_poll_until_completed() {
    let harness = TestHarness::new(3);
    let orchestrator = harness.orchestrator();
    let app = app(&orchestrator, ApiConfig::default());

    let (status, body) = send(
        &app,
        post_json(
            "/api/generate-video",
            json!({"source_url": SOURCE_URL, "userId": "user-1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["jobId"].as_str().unwrap().to_string();

    let record = harness
        .wait_for_terminal(&orchestrator, &JobId::from_string(job_id.clone()))
        .await;
    assert_eq!(record.status, JobStatus::Completed);

    let (status, body) = send(&app, get(&format!("/api/video-status/{}", job_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobId"], job_id);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["progress"], 100);
    assert_eq!(
        body["videoUrl"],
        format!("memory://bucket/videos/{}.mp4", job_id)
    );
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_failed_job_reports_error() {
    let harness = TestHarness::new(2);
    harness.script.set_reply(r#"{"scenes": []}"#);
    let orchestrator = harness.orchestrator();
    let app = app(&orchestrator, ApiConfig::default());

    let (_, body) = send(
        &app,
        post_json(
            "/api/generate-video",
            json!({"sourceUrl": SOURCE_URL, "userId": "user-1"}),
        ),
    )
    .await;
    let job_id = body["jobId"].as_str().unwrap().to_string();
    harness
        .wait_for_terminal(&orchestrator, &JobId::from_string(job_id.clone()))
        .await;

    let (status, body) = send(&app, get(&format!("/api/video-status/{}", job_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("scripting: ValidationError:"));
    assert!(body.get("videoUrl").is_none());
}

#[tokio::test]
async fn test_submit_rejects_bad_input() {
    let harness = TestHarness::new(2);
    let orchestrator = harness.orchestrator();
    let app = app(&orchestrator, ApiConfig::default());

    let (status, body) = send(
        &app,
        post_json("/api/generate-video", json!({"source_url": SOURCE_URL})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, _) = send(
        &app,
        post_json(
            "/api/generate-video",
            json!({"source_url": SOURCE_URL, "userId": ""}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        post_json(
            "/api/generate-video",
            json!({"source_url": "http://169.254.169.254/latest/meta-data/", "userId": "user-1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("internal"));

    let (status, _) = send(
        &app,
        post_json(
            "/api/generate-video",
            json!({"source_url": "ftp://shop.example.com/item", "userId": "user-1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(harness.ledger.is_empty().await);
}

#[tokio::test]
async fn test_unknown_job_reads_as_pending() {
    let harness = TestHarness::new(2);
    let app = app(&harness.orchestrator(), ApiConfig::default());

    let (status, body) = send(&app, get("/api/video-status/does-not-exist")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"jobId": "does-not-exist", "status": "pending", "progress": 0})
    );

    let long_id = "a".repeat(80);
    let (status, _) = send(&app, get(&format!("/api/video-status/{}", long_id))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_latest_job_for_user() {
    let harness = TestHarness::new(2);
    let orchestrator = harness.orchestrator();
    let app = app(&orchestrator, ApiConfig::default());

    let (status, body) = send(&app, get("/api/video-status/latest?user=user-7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": null}));

    let (_, body) = send(
        &app,
        post_json(
            "/api/generate-video",
            json!({"source_url": SOURCE_URL, "userId": "user-7"}),
        ),
    )
    .await;
    let job_id = body["jobId"].as_str().unwrap().to_string();
    harness
        .wait_for_terminal(&orchestrator, &JobId::from_string(job_id.clone()))
        .await;

    let (status, body) = send(&app, get("/api/video-status/latest?user=user-7")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobId"], job_id);
    assert_eq!(body["status"], "completed");

    let (status, _) = send(&app, get("/api/video-status/latest")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_endpoint() {
    let harness = TestHarness::new(2);
    harness.motion.stick(0);
    let orchestrator = harness.orchestrator();
    let app = app(&orchestrator, ApiConfig::default());

    let (status, _) = send(&app, post("/api/video-status/no-such-job/cancel")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(
        &app,
        post_json(
            "/api/generate-video",
            json!({"source_url": SOURCE_URL, "userId": "user-1"}),
        ),
    )
    .await;
    let job_id = body["jobId"].as_str().unwrap().to_string();
    let id = JobId::from_string(job_id.clone());
    harness.wait_for_status(&id, JobStatus::GeneratingMedia).await;

    let (status, body) = send(&app, post(&format!("/api/video-status/{}/cancel", job_id))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, json!({"jobId": job_id, "cancelled": true}));

    harness.wait_for_terminal(&orchestrator, &id).await;
    let (_, body) = send(&app, get(&format!("/api/video-status/{}", job_id))).await;
    assert_eq!(body["status"], "failed");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("generating_media: CancellationError:"));

    let (status, _) = send(&app, post(&format!("/api/video-status/{}/cancel", job_id))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_health_and_ready() {
    let harness = TestHarness::new(2);
    let app = app(&harness.orchestrator(), ApiConfig::default());

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = send(&app, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["ledger"]["status"], "ok");
    assert_eq!(body["checks"]["storage"]["status"], "ok");
    assert_eq!(body["running_jobs"], 0);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let harness = TestHarness::new(2);
    let app = app(&harness.orchestrator(), ApiConfig::default());

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("x-request-id"));

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn test_rate_limit_per_client() {
    let harness = TestHarness::new(2);
    let config = ApiConfig {
        rate_limit_rps: 1,
        ..Default::default()
    };
    let app = app(&harness.orchestrator(), config);

    let from = |ip: &str| {
        Request::builder()
            .uri("/api/video-status/latest?user=user-1")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&app, from("203.0.113.9")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, from("203.0.113.9")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["detail"].is_string());
    let (status, _) = send(&app, from("203.0.113.10")).await;
    assert_eq!(status, StatusCode::OK);

    // health probes are not rate limited
    for _ in 0..3 {
        let request = Request::builder()
            .uri("/health")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let harness = TestHarness::new(2);
    let config = ApiConfig {
        max_body_size: 256,
        ..Default::default()
    };
    let app = app(&harness.orchestrator(), config);

    let body = json!({"source_url": SOURCE_URL, "userId": "x".repeat(1024)}).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/api/generate-video")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

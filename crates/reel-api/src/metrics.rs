//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex::{Captures, Regex};

/// Install the Prometheus recorder and return its render handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "reel_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "reel_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "reel_http_requests_in_flight";
    pub const JOBS_ACCEPTED_TOTAL: &str = "reel_jobs_accepted_total";
    pub const JOBS_CANCEL_REQUESTS_TOTAL: &str = "reel_job_cancel_requests_total";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "reel_rate_limit_hits_total";
}

static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

static STATUS_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/video-status/([A-Za-z0-9_:-]+)").unwrap());

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_job_accepted() {
    counter!(names::JOBS_ACCEPTED_TOTAL).increment(1);
}

pub fn record_cancel_request(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::JOBS_CANCEL_REQUESTS_TOTAL, &labels).increment(1);
}

pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse job ids so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let path = UUID.replace_all(path, ":id");
    STATUS_ID
        .replace_all(&path, |caps: &Captures| match &caps[1] {
            "latest" => caps[0].to_string(),
            _ => "/video-status/:id".to_string(),
        })
        .into_owned()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/video-status/550e8400-e29b-41d4-a716-446655440000"),
            "/api/video-status/:id"
        );
        assert_eq!(
            sanitize_path("/api/video-status/550e8400-e29b-41d4-a716-446655440000/cancel"),
            "/api/video-status/:id/cancel"
        );
        assert_eq!(sanitize_path("/api/video-status/job_42"), "/api/video-status/:id");
        assert_eq!(sanitize_path("/api/video-status/latest"), "/api/video-status/latest");
        assert_eq!(sanitize_path("/api/generate-video"), "/api/generate-video");
    }
}

//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "jboard_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "jboard_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "jboard_http_requests_in_flight";

    // Domain metrics
    pub const JOBS_POSTED_TOTAL: &str = "jboard_jobs_posted_total";
    pub const APPLICATIONS_SUBMITTED_TOTAL: &str = "jboard_applications_submitted_total";
    pub const APPLICATION_DECISIONS_TOTAL: &str = "jboard_application_decisions_total";
    pub const COMMIT_RETRIES_TOTAL: &str = "jboard_commit_retries_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "jboard_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a job posting created.
pub fn record_job_posted() {
    counter!(names::JOBS_POSTED_TOTAL).increment(1);
}

/// Record an application submitted.
pub fn record_application_submitted() {
    counter!(names::APPLICATIONS_SUBMITTED_TOTAL).increment(1);
}

/// Record a poster decision on an application.
pub fn record_application_decided(decision: &str) {
    let labels = [("decision", decision.to_string())];
    counter!(names::APPLICATION_DECISIONS_TOTAL, &labels).increment(1);
}

/// Record a contended write retried against a fresh snapshot.
pub fn record_commit_retry(operation: &str) {
    let labels = [("operation", operation.to_string())];
    counter!(names::COMMIT_RETRIES_TOTAL, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    // Normalize job ids in the apply route
    let path = regex_lite::Regex::new(r"/jobs/[a-zA-Z0-9_-]+/apply")
        .unwrap()
        .replace_all(path, "/jobs/:job_id/apply");
    // Normalize application ids in the status route
    let path = regex_lite::Regex::new(r"/applications/[a-zA-Z0-9_-]+/status")
        .unwrap()
        .replace_all(&path, "/applications/:application_id/status");
    // Replace remaining UUIDs and numeric IDs with placeholders
    let path =
        regex_lite::Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
            .unwrap()
            .replace_all(&path, ":id");
    let path = regex_lite::Regex::new(r"/[0-9]+(/|$)")
        .unwrap()
        .replace_all(&path, "/:id$1");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

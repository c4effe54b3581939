//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "execboard_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "execboard_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "execboard_http_requests_in_flight";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "execboard_rate_limit_hits_total";

    // AI metrics
    pub const AI_REQUESTS_TOTAL: &str = "execboard_ai_requests_total";
    pub const AI_REQUEST_DURATION_SECONDS: &str = "execboard_ai_request_duration_seconds";

    // Payment metrics
    pub const WEBHOOK_EVENTS_TOTAL: &str = "execboard_webhook_events_total";
    pub const CHECKOUT_SESSIONS_TOTAL: &str = "execboard_checkout_sessions_total";

    // Side effects
    pub const NOTIFICATION_FAILURES_TOTAL: &str = "execboard_notification_failures_total";
    pub const RESUME_UPLOADS_TOTAL: &str = "execboard_resume_uploads_total";
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

/// Record rate limit hit.
pub fn record_rate_limit_hit(policy: &str, path: &str) {
    let labels = [
        ("policy", policy.to_string()),
        ("path", sanitize_path(path)),
    ];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Record an AI call outcome (`ok` or an error kind).
pub fn record_ai_request(operation: &str, outcome: &str, duration_secs: f64) {
    let labels = [
        ("operation", operation.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::AI_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::AI_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a processed webhook event.
pub fn record_webhook_event(event_type: &str, outcome: &str) {
    let labels = [
        ("type", event_type.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::WEBHOOK_EVENTS_TOTAL, &labels).increment(1);
}

/// Record a created checkout session.
pub fn record_checkout_session(mode: &str) {
    let labels = [("mode", mode.to_string())];
    counter!(names::CHECKOUT_SESSIONS_TOTAL, &labels).increment(1);
}

/// Record a notification that could not be stored.
pub fn record_notification_failure(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::NOTIFICATION_FAILURES_TOTAL, &labels).increment(1);
}

/// Record a resume upload attempt.
pub fn record_resume_upload(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::RESUME_UPLOADS_TOTAL, &labels).increment(1);
}

static UUID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("valid UUID pattern")
});

static NUMERIC_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/[0-9]+(/|$)").expect("valid numeric pattern")
});

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    let path = UUID_SEGMENT.replace_all(path, ":id");
    let path = NUMERIC_SEGMENT.replace_all(&path, "/:id$1");
    path.into_owned()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/jobs/550e8400-e29b-41d4-a716-446655440000/apply"),
            "/api/jobs/:id/apply"
        );
        assert_eq!(
            sanitize_path("/api/admin/jobs/550E8400-E29B-41D4-A716-446655440000/approve"),
            "/api/admin/jobs/:id/approve"
        );
        assert_eq!(sanitize_path("/api/messages/42"), "/api/messages/:id");
        assert_eq!(sanitize_path("/api/jobs"), "/api/jobs");
    }
}

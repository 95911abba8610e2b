//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vdub_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vdub_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vdub_http_requests_in_flight";

    // WebSocket metrics
    pub const WS_CONNECTIONS_TOTAL: &str = "vdub_ws_connections_total";
    pub const WS_CONNECTIONS_ACTIVE: &str = "vdub_ws_connections_active";
    pub const WS_MESSAGES_SENT: &str = "vdub_ws_messages_sent_total";
    pub const WS_MESSAGES_RECEIVED: &str = "vdub_ws_messages_received_total";
    pub const WS_RESYNCS_TOTAL: &str = "vdub_ws_resyncs_total";

    // Uploads
    pub const UPLOAD_BYTES_TOTAL: &str = "vdub_upload_bytes_total";
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

/// Record WebSocket connection.
pub fn record_ws_connection() {
    counter!(names::WS_CONNECTIONS_TOTAL).increment(1);
}

/// Update active WebSocket connections gauge.
pub fn set_ws_active_connections(count: i64) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).set(count as f64);
}

/// Record WebSocket message sent.
pub fn record_ws_message_sent(message_type: &'static str) {
    counter!(names::WS_MESSAGES_SENT, "type" => message_type).increment(1);
}

/// Record WebSocket message received.
pub fn record_ws_message_received() {
    counter!(names::WS_MESSAGES_RECEIVED).increment(1);
}

/// Record a lagging socket being resynchronised with a fresh snapshot.
pub fn record_ws_resync() {
    counter!(names::WS_RESYNCS_TOTAL).increment(1);
}

/// Record bytes written by an upload.
pub fn record_upload_bytes(bytes: u64) {
    counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
}

/// Collapse per-file paths so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    match path.strip_prefix("/download/") {
        Some(_) => "/download/:filename".to_string(),
        None => path.to_string(),
    }
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

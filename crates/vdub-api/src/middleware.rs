//! API middleware.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, Response};
use axum::middleware::Next;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

/// Paths polled often enough that logging them would bury everything else.
const QUIET_PATHS: &[&str] = &["/health", "/ready", "/status", "/metrics"];

const REQUEST_ID_HEADER: &str = "x-request-id";

/// CORS for the browser control panel.
///
/// `*` allows any origin without credentials; explicit origins get
/// credentials and an explicit header list.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .max_age(Duration::from_secs(600));

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any).allow_headers(Any).expose_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    layer
        .allow_origin(allowed)
        .allow_credentials(true)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_DISPOSITION, header::CONTENT_LENGTH])
}

/// Tag each request with an id and log the outcome.
///
/// A client-supplied `X-Request-ID` is kept; otherwise one is generated.
/// The id is echoed on the response.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    if status.is_server_error() {
        warn!(request_id = %request_id, method = %method, path = %path, status = status.as_u16(), elapsed_ms, "Request failed");
    } else if !QUIET_PATHS.contains(&path.as_str()) {
        info!(request_id = %request_id, method = %method, path = %path, status = status.as_u16(), elapsed_ms, "Request completed");
    }

    response
}

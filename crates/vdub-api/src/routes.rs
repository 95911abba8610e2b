//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    cancel_workflow, download_file, get_files, get_status, health, ready, reset_workflow,
    start_workflow, upload_video,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_logging};
use crate::state::AppState;
use crate::ws::ws_handler;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let workflow_routes = Router::new()
        .route("/status", get(get_status))
        .route("/start", post(start_workflow))
        .route("/cancel", post(cancel_workflow))
        .route("/reset", post(reset_workflow));

    let file_routes = Router::new()
        .route("/upload", post(upload_video))
        .route("/files", get(get_files))
        .route("/download/:filename", get(download_file));

    let ws_routes = Router::new().route("/ws", get(ws_handler));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(workflow_routes)
        .merge(file_routes)
        .merge(ws_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Uploads are whole videos; the configured limit replaces axum's 2 MB default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

//! Axum HTTP/WebSocket control surface for the dubbing workflow.
//!
//! This crate provides:
//! - Workflow control over HTTP (`/start`, `/cancel`, `/reset`, `/status`)
//! - A WebSocket status stream that also accepts control actions
//! - Video upload, artifact listing and download
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;

//! Liveness and readiness probes.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use vdub_media::{check_ffmpeg, check_ffprobe, MediaResult};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    /// Binary name -> resolved path, or the lookup error
    pub checks: BTreeMap<&'static str, Result<String, String>>,
}

fn lookup(result: MediaResult<std::path::PathBuf>) -> Result<String, String> {
    result
        .map(|p| p.display().to_string())
        .map_err(|e| e.to_string())
}

/// `GET /ready`: jobs cannot run unless ffmpeg and ffprobe are on PATH.
pub async fn ready() -> (StatusCode, Json<ReadinessResponse>) {
    let checks = BTreeMap::from([
        ("ffmpeg", lookup(check_ffmpeg())),
        ("ffprobe", lookup(check_ffprobe())),
    ]);

    if checks.values().all(Result::is_ok) {
        (StatusCode::OK, Json(ReadinessResponse { status: "ready", checks }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse { status: "degraded", checks }),
        )
    }
}

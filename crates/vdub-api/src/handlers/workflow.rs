//! Workflow control handlers: status, start, cancel, reset.

use std::path::PathBuf;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use vdub_models::StatusSnapshot;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Start request body.
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub video_path: Option<String>,
}

/// Response for accepted control actions.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

/// `GET /status`
pub async fn get_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.orchestrator.status())
}

/// `POST /start`
///
/// The job runs in the background; progress is observed through `/status`
/// or the WebSocket.
pub async fn start_workflow(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> ApiResult<Json<ActionResponse>> {
    let video_path = request
        .video_path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No video path provided"))?;

    let running = state.orchestrator.start(PathBuf::from(&video_path))?;
    info!(job_id = %running.handle.id, video_path = %video_path, "Workflow started over HTTP");

    Ok(Json(ActionResponse {
        success: true,
        message: "Workflow started".to_string(),
        job_id: Some(running.handle.id.to_string()),
    }))
}

/// `POST /cancel`
pub async fn cancel_workflow(State(state): State<AppState>) -> ApiResult<Json<ActionResponse>> {
    cancel_active(&state)?;
    Ok(Json(ActionResponse {
        success: true,
        message: "Cancellation requested".to_string(),
        job_id: None,
    }))
}

/// `POST /reset`
pub async fn reset_workflow(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.orchestrator.reset())
}

/// Cancel whichever job is active. Shared with the WebSocket handler.
pub(crate) fn cancel_active(state: &AppState) -> ApiResult<()> {
    let cancelled = state
        .orchestrator
        .active_handle()
        .is_some_and(|handle| state.orchestrator.cancel(&handle));

    if cancelled {
        Ok(())
    } else {
        Err(ApiError::conflict("No workflow is running"))
    }
}

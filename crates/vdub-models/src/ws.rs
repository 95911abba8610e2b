//! WebSocket message types.
//!
//! Every server frame is `{"type": ..., "data": ...}`; every client frame
//! carries an `action` field.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::StatusSnapshot;

/// Final outcome of a workflow.
///
/// Serializes as `{success: true, dubbed_chunks, merged_dubbed_video,
/// dubbed_audio, final_video}` or `{success: false, error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dubbed_chunks: Option<Vec<PathBuf>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_dubbed_video: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dubbed_audio: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_video: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowResult {
    pub fn completed(
        dubbed_chunks: Vec<PathBuf>,
        merged_dubbed_video: PathBuf,
        dubbed_audio: PathBuf,
        final_video: PathBuf,
    ) -> Self {
        Self {
            success: true,
            dubbed_chunks: Some(dubbed_chunks),
            merged_dubbed_video: Some(merged_dubbed_video),
            dubbed_audio: Some(dubbed_audio),
            final_video: Some(final_video),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            dubbed_chunks: None,
            merged_dubbed_video: None,
            dubbed_audio: None,
            final_video: None,
            error: Some(error.into()),
        }
    }
}

/// Event fanned out to every connected observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StatusEvent {
    Status(StatusSnapshot),
    Result(WorkflowResult),
}

/// Acknowledgement payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AckPayload {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
}

/// Error payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorPayload {
    pub message: String,
}

/// Pong payload echoing the client's timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PongPayload {
    pub timestamp: serde_json::Value,
}

/// Any frame the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Status(StatusSnapshot),
    Result(WorkflowResult),
    Ack(AckPayload),
    Error(ErrorPayload),
    Pong(PongPayload),
}

impl ServerMessage {
    pub fn ack(message: impl Into<String>) -> Self {
        ServerMessage::Ack(AckPayload {
            message: message.into(),
            video_path: None,
        })
    }

    pub fn ack_started(video_path: impl Into<String>) -> Self {
        ServerMessage::Ack(AckPayload {
            message: "Workflow started".to_string(),
            video_path: Some(video_path.into()),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorPayload {
            message: message.into(),
        })
    }

    pub fn pong(timestamp: serde_json::Value) -> Self {
        ServerMessage::Pong(PongPayload { timestamp })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ServerMessage::Status(_) => "status",
            ServerMessage::Result(_) => "result",
            ServerMessage::Ack(_) => "ack",
            ServerMessage::Error(_) => "error",
            ServerMessage::Pong(_) => "pong",
        }
    }
}

impl From<StatusEvent> for ServerMessage {
    fn from(event: StatusEvent) -> Self {
        match event {
            StatusEvent::Status(snapshot) => ServerMessage::Status(snapshot),
            StatusEvent::Result(result) => ServerMessage::Result(result),
        }
    }
}

const KNOWN_ACTIONS: &[&str] = &["start_workflow", "get_status", "cancel", "reset", "ping"];

fn default_timestamp() -> serde_json::Value {
    serde_json::Value::from(0)
}

/// Control action sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    StartWorkflow {
        #[serde(default)]
        video_path: Option<String>,
    },
    GetStatus,
    Cancel,
    Reset,
    Ping {
        #[serde(default = "default_timestamp")]
        timestamp: serde_json::Value,
    },
}

/// Why a client frame could not be turned into an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientActionError {
    #[error("Invalid JSON format")]
    InvalidJson,

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Malformed {action} message: {reason}")]
    Malformed { action: String, reason: String },
}

impl ClientAction {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, ClientActionError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|_| ClientActionError::InvalidJson)?;

        let action = match value.get("action") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "null".to_string(),
        };

        if !KNOWN_ACTIONS.contains(&action.as_str()) {
            return Err(ClientActionError::UnknownAction(action));
        }

        serde_json::from_value(value).map_err(|e| ClientActionError::Malformed {
            action,
            reason: e.to_string(),
        })
    }
}

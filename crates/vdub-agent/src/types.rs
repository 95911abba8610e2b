//! Agent request/response types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One dubbing job for the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DubRequest {
    /// Segment to dub
    pub input: PathBuf,
    /// Where the agent must save the dubbed segment
    pub output: PathBuf,
    /// Target language name, e.g. `Hungarian`
    pub target_language: String,
    /// Index of the segment within the job
    pub segment_index: u32,
}

/// Body of `POST /session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub email: String,
    pub password: String,
    pub headless: bool,
}

/// Response of `POST /session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
}

/// Body of `POST /dub`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DubJobRequest {
    pub session_id: String,
    pub input_path: String,
    pub output_path: String,
    pub target_language: String,
    pub headless: bool,
    pub timeout_secs: u64,
}

/// Response of `POST /dub`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DubResponse {
    /// `completed` or `failed`
    pub status: String,
    /// Where the dubbed file was saved
    #[serde(default)]
    pub output_path: Option<String>,
    /// Failure reason
    #[serde(default)]
    pub error: Option<String>,
}

impl DubResponse {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct HealthResponse {
    pub status: String,
}

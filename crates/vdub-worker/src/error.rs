//! Worker error types.

use std::path::PathBuf;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("A workflow is already running")]
    AlreadyRunning,

    #[error("Video file not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Could not log in to the dubbing agent: {0}")]
    AuthenticationFailed(String),

    #[error("No chunk could be dubbed ({total} attempted)")]
    AllSegmentsFailed { total: usize },

    #[error("Workflow cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[source] vdub_media::MediaError),

    #[error("Agent error: {0}")]
    Agent(#[from] vdub_agent::AgentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<vdub_media::MediaError> for WorkerError {
    fn from(error: vdub_media::MediaError) -> Self {
        match error {
            vdub_media::MediaError::Cancelled => WorkerError::Cancelled,
            other => WorkerError::Media(other),
        }
    }
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether this error ends the job in the `error` state.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, WorkerError::Cancelled | WorkerError::AlreadyRunning)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WorkerError::Cancelled)
    }
}

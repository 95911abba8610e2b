//! Agent client error types.

use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent credentials are not configured (set AGENT_EMAIL and AGENT_PASSWORD)")]
    MissingCredentials,

    #[error("Agent login rejected: {0}")]
    LoginRejected(String),

    #[error("No agent session established")]
    NotAuthenticated,

    #[error("Agent service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Dubbing failed: {0}")]
    DubbingFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AgentError::MissingCredentials)
    }
}

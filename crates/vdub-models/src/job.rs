//! Job types.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::status::{clamp_progress, Phase, StatusKind, StatusSnapshot, StatusUpdate};
use crate::ws::WorkflowResult;

/// Unique job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job.
///
/// Non-terminal states are ordered; a job only ever moves forward through
/// them. `Error` and `Cancelled` are reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    Initializing,
    Splitting,
    Dubbing,
    Merging,
    Extracting,
    Replacing,
    Completed,
    Error,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        self.phase().as_str()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Error | JobState::Cancelled)
    }

    /// Whether a job in this state occupies the single active slot.
    pub fn is_active(&self) -> bool {
        !self.is_terminal() && *self != JobState::Idle
    }

    /// Phase name exposed in status snapshots.
    pub fn phase(&self) -> Phase {
        match self {
            JobState::Idle => Phase::Waiting,
            JobState::Initializing => Phase::Initializing,
            JobState::Splitting => Phase::Splitting,
            JobState::Dubbing => Phase::Dubbing,
            JobState::Merging => Phase::Merging,
            JobState::Extracting => Phase::Extracting,
            JobState::Replacing => Phase::Replacing,
            JobState::Completed => Phase::Completed,
            JobState::Error => Phase::Error,
            JobState::Cancelled => Phase::Cancelled,
        }
    }

    /// Coarse status exposed in status snapshots.
    pub fn status_kind(&self) -> StatusKind {
        match self {
            JobState::Idle => StatusKind::Idle,
            JobState::Completed => StatusKind::Completed,
            JobState::Error => StatusKind::Error,
            JobState::Cancelled => StatusKind::Cancelled,
            _ => StatusKind::Processing,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            JobState::Idle => 0,
            JobState::Initializing => 1,
            JobState::Splitting => 2,
            JobState::Dubbing => 3,
            JobState::Merging => 4,
            JobState::Extracting => 5,
            JobState::Replacing => 6,
            JobState::Completed | JobState::Error | JobState::Cancelled => 7,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected job state transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: JobState,
    pub to: JobState,
}

/// The single unit of orchestrated work.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Source video
    pub source: PathBuf,

    /// Lifecycle state
    pub state: JobState,

    /// Latest human-readable message
    pub message: String,

    /// Progress of the current phase (0-100)
    pub progress: f64,

    /// 1-based index of the chunk being worked on
    pub current_chunk: u32,

    /// Number of chunks
    pub total_chunks: u32,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Final outcome (once terminal)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<WorkflowResult>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job for the given source video.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            source: source.into(),
            state: JobState::Initializing,
            message: String::new(),
            progress: 0.0,
            current_chunk: 0,
            total_chunks: 0,
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move the job to `next`, resetting phase progress.
    ///
    /// Terminal states are final and non-terminal states never move back.
    pub fn advance(&mut self, next: JobState, message: impl Into<String>) -> Result<(), TransitionError> {
        let invalid = self.state.is_terminal()
            || next == JobState::Idle
            || (!next.is_terminal() && next.rank() < self.state.rank());
        if invalid {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }

        self.state = next;
        self.message = message.into();
        self.progress = match next {
            JobState::Completed => 100.0,
            _ => 0.0,
        };
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record progress within the current phase.
    ///
    /// Progress never decreases inside a phase; lower values are ignored.
    /// Returns false if the job is already terminal.
    pub fn record_progress(
        &mut self,
        message: impl Into<String>,
        progress: f64,
        current_chunk: Option<u32>,
        total_chunks: Option<u32>,
    ) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.message = message.into();
        self.progress = self.progress.max(clamp_progress(progress));
        if let Some(current) = current_chunk {
            self.current_chunk = current;
        }
        if let Some(total) = total_chunks {
            self.total_chunks = total;
        }
        self.updated_at = Utc::now();
        true
    }

    /// Mark the job failed.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        let error = error.into();
        self.advance(JobState::Error, error.clone())?;
        self.result = Some(WorkflowResult::failed(error.clone()));
        self.error = Some(error);
        Ok(())
    }

    /// Project the job into a full status update.
    pub fn status_update(&self) -> StatusUpdate {
        StatusUpdate::new(self.state.status_kind(), self.message.clone(), self.progress)
            .with_phase(self.state.phase())
            .with_chunks(self.current_chunk, self.total_chunks)
    }

    /// Project the job into a status snapshot.
    pub fn snapshot(&self) -> StatusSnapshot {
        let mut snapshot = StatusSnapshot::idle();
        snapshot.apply(&self.status_update());
        snapshot
    }
}

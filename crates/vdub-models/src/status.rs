//! Status snapshot types.
//!
//! A [`StatusSnapshot`] is the full observable status of the workflow. It is
//! what observers receive on connect and after every update.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Coarse workflow status as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// No job has been started (or the last one was reset)
    #[default]
    Idle,
    /// A job is running
    Processing,
    /// The last job finished successfully
    Completed,
    /// The last job failed
    Error,
    /// The last job was cancelled
    Cancelled,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Idle => "idle",
            StatusKind::Processing => "processing",
            StatusKind::Completed => "completed",
            StatusKind::Error => "error",
            StatusKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named stage of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Waiting,
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

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::Initializing => "initializing",
            Phase::Splitting => "splitting",
            Phase::Dubbing => "dubbing",
            Phase::Merging => "merging",
            Phase::Extracting => "extracting",
            Phase::Replacing => "replacing",
            Phase::Completed => "completed",
            Phase::Error => "error",
            Phase::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full status record broadcast to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusSnapshot {
    /// Coarse status
    pub status: StatusKind,
    /// Human-readable message
    pub message: String,
    /// Progress of the current phase (0-100)
    pub progress: f64,
    /// 1-based index of the chunk being worked on
    pub current_chunk: u32,
    /// Number of chunks in the job
    pub total_chunks: u32,
    /// Current phase
    pub phase: Phase,
}

impl StatusSnapshot {
    /// The snapshot observers see before any job runs and after a reset.
    pub fn idle() -> Self {
        Self {
            status: StatusKind::Idle,
            message: String::new(),
            progress: 0.0,
            current_chunk: 0,
            total_chunks: 0,
            phase: Phase::Waiting,
        }
    }

    /// Apply a partial update in place.
    ///
    /// `status`, `message` and `progress` always override; the optional
    /// fields keep their previous value when omitted.
    pub fn apply(&mut self, update: &StatusUpdate) {
        self.status = update.status;
        self.message = update.message.clone();
        self.progress = clamp_progress(update.progress);
        if let Some(phase) = update.phase {
            self.phase = phase;
        }
        if let Some(current) = update.current_chunk {
            self.current_chunk = current;
        }
        if let Some(total) = update.total_chunks {
            self.total_chunks = total;
        }
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

/// A partial status update.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: StatusKind,
    pub message: String,
    pub progress: f64,
    pub phase: Option<Phase>,
    pub current_chunk: Option<u32>,
    pub total_chunks: Option<u32>,
}

impl StatusUpdate {
    /// Create an update that only touches status, message and progress.
    pub fn new(status: StatusKind, message: impl Into<String>, progress: f64) -> Self {
        Self {
            status,
            message: message.into(),
            progress,
            phase: None,
            current_chunk: None,
            total_chunks: None,
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_chunks(mut self, current: u32, total: u32) -> Self {
        self.current_chunk = Some(current);
        self.total_chunks = Some(total);
        self
    }

    pub fn with_current_chunk(mut self, current: u32) -> Self {
        self.current_chunk = Some(current);
        self
    }
}

/// Clamp a progress value into 0-100, mapping NaN to 0.
pub fn clamp_progress(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_snapshot_serialization() {
        let json = serde_json::to_value(StatusSnapshot::idle()).unwrap();

        assert_eq!(json["status"], "idle");
        assert_eq!(json["message"], "");
        assert_eq!(json["progress"].as_f64(), Some(0.0));
        assert_eq!(json["current_chunk"], 0);
        assert_eq!(json["total_chunks"], 0);
        assert_eq!(json["phase"], "waiting");
    }

    #[test]
    fn test_apply_retains_omitted_fields() {
        let mut snapshot = StatusSnapshot::idle();
        snapshot.apply(
            &StatusUpdate::new(StatusKind::Processing, "Dubbing", 0.0)
                .with_phase(Phase::Dubbing)
                .with_chunks(0, 4),
        );
        snapshot.apply(&StatusUpdate::new(StatusKind::Processing, "Chunk 1/4 dubbed", 25.0));

        assert_eq!(snapshot.phase, Phase::Dubbing);
        assert_eq!(snapshot.total_chunks, 4);
        assert_eq!(snapshot.current_chunk, 0);
        assert_eq!(snapshot.message, "Chunk 1/4 dubbed");
        assert!((snapshot.progress - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(clamp_progress(150.0), 100.0);
        assert_eq!(clamp_progress(-3.0), 0.0);
        assert_eq!(clamp_progress(f64::NAN), 0.0);
    }
}

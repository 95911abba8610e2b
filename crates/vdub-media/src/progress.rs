//! Progress notification interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Progress within the current phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Human-readable message
    pub message: String,
    /// Phase progress (0-100)
    pub progress: f64,
    /// 1-based chunk currently being worked on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_chunk: Option<u32>,
    /// Total chunk count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,
}

impl ProgressReport {
    pub fn new(message: impl Into<String>, progress: f64) -> Self {
        Self {
            message: message.into(),
            progress,
            current_chunk: None,
            total_chunks: None,
        }
    }

    pub fn with_chunks(mut self, current: u32, total: u32) -> Self {
        self.current_chunk = Some(current);
        self.total_chunks = Some(total);
        self
    }
}

/// Progress for step `index` (0-based) of `total`, as a percentage.
///
/// Completing step `i` of `n` is always `(i + 1) / n * 100`.
pub fn step_progress(index: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (index as f64 + 1.0) / total as f64 * 100.0
}

/// Receiver for progress reports.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, report: ProgressReport);
}

/// Sink that discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

#[async_trait]
impl ProgressSink for NoopProgress {
    async fn report(&self, _report: ProgressReport) {}
}

//! Structured per-job logging.
//!
//! Every line carries the job id and the source file name so interleaved
//! output from a reset job and its successor stays attributable.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, error, info, warn, Span};
use vdub_models::{JobId, Phase};

/// Lifecycle logger for one dubbing job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    source: String,
    started: Instant,
}

impl JobLogger {
    pub fn new(job_id: &JobId, source: &Path) -> Self {
        let source = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| source.display().to_string());
        Self {
            job_id: job_id.to_string(),
            source,
            started: Instant::now(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn log_start(&self) {
        info!(job_id = %self.job_id, source = %self.source, "Dubbing job started");
    }

    pub fn log_phase(&self, phase: Phase, message: &str) {
        info!(
            job_id = %self.job_id,
            phase = %phase,
            elapsed_secs = self.started.elapsed().as_secs(),
            "{}", message
        );
    }

    /// Per-chunk and per-cut progress is chatty, so it goes to debug.
    pub fn log_progress(&self, message: &str, progress: f64) {
        debug!(job_id = %self.job_id, progress = progress, "{}", message);
    }

    pub fn log_cancelled(&self) {
        warn!(
            job_id = %self.job_id,
            elapsed_secs = self.started.elapsed().as_secs(),
            "Dubbing job cancelled"
        );
    }

    pub fn log_failure(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            source = %self.source,
            elapsed_secs = self.started.elapsed().as_secs(),
            "Dubbing job failed: {}", message
        );
    }

    pub fn log_completion(&self, final_video: &str) {
        info!(
            job_id = %self.job_id,
            source = %self.source,
            elapsed_secs = self.started.elapsed().as_secs(),
            final_video = %final_video,
            "Dubbing job completed"
        );
    }

    /// Span the pipeline task runs in; collaborator logs inherit its fields.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("dubbing_job", job_id = %self.job_id, source = %self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_uses_file_name() {
        let job_id = JobId::from_string("job-1");
        let logger = JobLogger::new(&job_id, Path::new("/data/input/talk.mp4"));

        assert_eq!(logger.job_id(), "job-1");
        assert_eq!(logger.source(), "talk.mp4");
    }

    #[test]
    fn test_logger_without_file_name() {
        let logger = JobLogger::new(&JobId::new(), Path::new("/"));
        assert_eq!(logger.source(), "/");
    }
}

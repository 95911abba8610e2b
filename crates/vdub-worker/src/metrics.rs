//! Workflow metrics.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "vdub_jobs_started_total";
    pub const JOBS_FINISHED_TOTAL: &str = "vdub_jobs_finished_total";
    pub const JOB_DURATION_SECONDS: &str = "vdub_job_duration_seconds";
    pub const JOB_ACTIVE: &str = "vdub_job_active";
    pub const SEGMENTS_TRANSFORMED_TOTAL: &str = "vdub_segments_transformed_total";
    pub const STATUS_OBSERVERS: &str = "vdub_status_observers";
}

/// Record a job accepted by the orchestrator.
pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
    gauge!(names::JOB_ACTIVE).set(1.0);
}

/// Record a job reaching a terminal state (`completed`, `error`, `cancelled`).
pub fn record_job_finished(outcome: &'static str, duration_secs: f64) {
    counter!(names::JOBS_FINISHED_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
    gauge!(names::JOB_ACTIVE).set(0.0);
}

/// Record one segment's final outcome.
pub fn record_segment(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(names::SEGMENTS_TRANSFORMED_TOTAL, "outcome" => outcome).increment(1);
}

/// Update the connected-observer gauge.
pub fn set_observer_count(count: usize) {
    gauge!(names::STATUS_OBSERVERS).set(count as f64);
}

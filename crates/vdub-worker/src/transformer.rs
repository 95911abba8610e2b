//! Sequential dubbing of segments through the external agent.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vdub_agent::{AgentError, DubRequest, DubbingAgent};
use vdub_media::fs_utils::{remove_if_exists, require_output};
use vdub_media::{
    retry_async, retry_async_when, step_progress, ProgressReport, ProgressSink, RetryPolicy, RetryResult,
    WorkspaceLayout,
};
use vdub_models::{Segment, TransformResult};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Runs every segment of a job through the dubbing agent, one at a time.
///
/// Clones share one agent lock, so at most one job talks to the agent.
#[derive(Clone)]
pub struct SegmentTransformer {
    agent: Arc<dyn DubbingAgent>,
    agent_lock: Arc<Mutex<()>>,
    policy: RetryPolicy,
    layout: WorkspaceLayout,
    target_language: String,
}

impl SegmentTransformer {
    pub fn new(
        agent: Arc<dyn DubbingAgent>,
        policy: RetryPolicy,
        layout: WorkspaceLayout,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            agent_lock: Arc::new(Mutex::new(())),
            policy,
            layout,
            target_language: target_language.into(),
        }
    }

    /// Establish the agent session unless one is already cached.
    ///
    /// Missing credentials fail at once; other errors are retried.
    pub async fn authenticate(&self) -> WorkerResult<()> {
        if self.agent.is_authenticated().await {
            return Ok(());
        }

        let result = retry_async_when(
            &self.policy,
            "agent_login",
            || self.agent.authenticate(),
            |e| e.is_retryable(),
        )
        .await;

        match result {
            RetryResult::Success { .. } => Ok(()),
            RetryResult::Failed { error, .. } => Err(WorkerError::AuthenticationFailed(error.to_string())),
        }
    }

    /// Drop the agent session at the end of a job.
    pub async fn end_session(&self) {
        self.agent.invalidate().await;
    }

    /// Dub one segment into its pre-agreed output path.
    ///
    /// A leftover file at that path is removed first so it cannot be taken
    /// for fresh output. Agent errors and missing or empty output are both
    /// retried; exhausting the budget yields a failed result, not an error.
    pub async fn transform(&self, segment: &Segment) -> TransformResult {
        let output = self.layout.dubbed_chunk_path(segment.index);
        if let Err(e) = remove_if_exists(&output).await {
            warn!("Could not remove stale output {}: {}", output.display(), e);
        }

        let request = DubRequest {
            input: segment.path.clone(),
            output: output.clone(),
            target_language: self.target_language.clone(),
            segment_index: segment.index,
        };

        let operation = format!("dub_chunk_{:04}", segment.index);
        let result = retry_async(&self.policy, &operation, || self.dub_once(&request)).await;

        match result {
            RetryResult::Success { value, attempts } => {
                metrics::record_segment(true);
                TransformResult::succeeded(segment.index, value, attempts)
            }
            RetryResult::Failed { error, attempts } => {
                warn!(
                    segment = segment.index,
                    "Chunk dubbing failed after {} attempt(s): {}", attempts, error
                );
                metrics::record_segment(false);
                TransformResult::failed(segment.index, attempts)
            }
        }
    }

    /// One dubbing attempt. A session the agent dropped mid-job is
    /// re-established and the call repeated once.
    async fn dub_once(&self, request: &DubRequest) -> WorkerResult<PathBuf> {
        match self.agent.dub(request).await {
            Ok(_) => {}
            Err(AgentError::NotAuthenticated) => {
                warn!(segment = request.segment_index, "Agent session lost, logging in again");
                self.authenticate().await?;
                self.agent.dub(request).await?;
            }
            Err(e) => return Err(e.into()),
        }
        require_output(&request.output).await?;
        Ok(request.output.clone())
    }

    /// Dub a job's segments as one agent session.
    ///
    /// Waits for any earlier job still holding the agent, then runs
    /// [`transform_all`](Self::transform_all) and ends the session it
    /// opened before letting the next job in.
    pub async fn run_session(
        &self,
        segments: &[Segment],
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> WorkerResult<Vec<TransformResult>> {
        let _guard = match self.agent_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!("Waiting for the dubbing agent to be released");
                tokio::select! {
                    guard = self.agent_lock.lock() => guard,
                    _ = cancel.cancelled() => return Err(WorkerError::Cancelled),
                }
            }
        };

        let outcome = self.transform_all(segments, cancel, progress).await;
        self.end_session().await;
        outcome
    }

    /// Dub every segment in ascending index order.
    ///
    /// Logs in before the first segment and checks `cancel` before each
    /// one. Failed segments are skipped; if none succeed the whole call
    /// fails with [`WorkerError::AllSegmentsFailed`]. Results come back
    /// sorted by index.
    pub async fn transform_all(
        &self,
        segments: &[Segment],
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> WorkerResult<Vec<TransformResult>> {
        let mut ordered: Vec<&Segment> = segments.iter().collect();
        ordered.sort_by_key(|s| s.index);
        let total = ordered.len();
        let total_u32 = total as u32;

        self.authenticate().await?;

        let mut results = Vec::with_capacity(total);
        for (i, segment) in ordered.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(WorkerError::Cancelled);
            }

            let current = i as u32 + 1;
            let before = i as f64 / total as f64 * 100.0;
            progress
                .report(
                    ProgressReport::new(format!("Dubbing chunk {}/{}...", current, total), before)
                        .with_chunks(current, total_u32),
                )
                .await;

            let result = self.transform(segment).await;
            let message = if result.success {
                format!("Chunk {}/{} dubbed", current, total)
            } else {
                format!("Chunk {}/{} failed, skipping", current, total)
            };
            progress
                .report(ProgressReport::new(message, step_progress(i, total)).with_chunks(current, total_u32))
                .await;

            results.push(result);
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        if succeeded == 0 {
            return Err(WorkerError::AllSegmentsFailed { total });
        }

        info!("Dubbing finished: {}/{} chunk(s) dubbed", succeeded, total);
        progress
            .report(
                ProgressReport::new(format!("Dubbing finished: {}/{} chunks dubbed", succeeded, total), 100.0)
                    .with_chunks(total_u32, total_u32),
            )
            .await;

        results.sort_by_key(|r| r.index);
        Ok(results)
    }
}

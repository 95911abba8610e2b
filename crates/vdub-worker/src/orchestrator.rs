//! The single-flight dubbing job state machine.
//!
//! ```text
//! idle -> initializing -> splitting -> dubbing -> merging -> extracting -> replacing -> completed
//!                      \___________________________________________________/
//!                                         error | cancelled
//! ```
//!
//! The orchestrator owns the one active [`Job`] and is the only place its
//! state changes. Every change is projected into the [`StatusBroadcaster`]
//! while the slot lock is held, so a job that was reset away can never
//! publish over the idle snapshot.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};
use vdub_agent::{AgentConfig, DubbingAgent, HttpAgentClient};
use vdub_media::{Chunker, FfmpegTranscoder, ProgressReport, ProgressSink, Reassembler, Transcoder, WorkspaceLayout};
use vdub_models::{Job, JobId, JobState, StatusSnapshot, TransformResult, WorkflowResult};

use crate::broadcaster::StatusBroadcaster;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::transformer::SegmentTransformer;

/// Cancellation handle for a started job.
///
/// Cloning is cheap; any holder may pass it to [`Orchestrator::cancel`].
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub id: JobId,
    token: CancellationToken,
}

impl JobHandle {
    pub fn is_cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A started job: its handle plus the task driving it.
#[derive(Debug)]
pub struct RunningJob {
    pub handle: JobHandle,
    task: JoinHandle<WorkflowResult>,
}

impl RunningJob {
    /// Wait for the pipeline task to finish.
    pub async fn wait(self) -> WorkflowResult {
        match self.task.await {
            Ok(result) => result,
            Err(e) => WorkflowResult::failed(format!("workflow task aborted: {}", e)),
        }
    }
}

struct Slot {
    job: Job,
    token: CancellationToken,
}

struct Inner {
    config: WorkerConfig,
    layout: WorkspaceLayout,
    chunker: Chunker,
    transformer: SegmentTransformer,
    reassembler: Reassembler,
    broadcaster: StatusBroadcaster,
    slot: Mutex<Option<Slot>>,
}

/// Drives one dubbing job at a time through every phase.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        config: WorkerConfig,
        transcoder: Arc<dyn Transcoder>,
        agent: Arc<dyn DubbingAgent>,
        broadcaster: StatusBroadcaster,
    ) -> Self {
        let layout = config.layout();
        let policy = config.retry_policy();

        let chunker = Chunker::new(transcoder.clone(), layout.clone());
        let transformer =
            SegmentTransformer::new(agent, policy, layout.clone(), config.target_language.clone());
        let reassembler = Reassembler::new(transcoder, policy, config.audio_settings());

        Self {
            inner: Arc::new(Inner {
                config,
                layout,
                chunker,
                transformer,
                reassembler,
                broadcaster,
                slot: Mutex::new(None),
            }),
        }
    }

    /// Build with the ffmpeg transcoder and the HTTP agent client.
    pub fn from_config(config: WorkerConfig, broadcaster: StatusBroadcaster) -> WorkerResult<Self> {
        config.validate()?;

        let transcoder = FfmpegTranscoder::with_timeout(config.ffmpeg_timeout.map(|t| t.as_secs()));
        let agent = HttpAgentClient::new(AgentConfig {
            headless: config.browser_headless,
            timeout: config.browser_timeout,
            ..AgentConfig::from_env()
        })?;

        Ok(Self::new(config, Arc::new(transcoder), Arc::new(agent), broadcaster))
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.inner.layout
    }

    pub fn broadcaster(&self) -> &StatusBroadcaster {
        &self.inner.broadcaster
    }

    /// Current status snapshot.
    pub fn status(&self) -> StatusSnapshot {
        self.inner.broadcaster.snapshot()
    }

    /// The job in the slot, if any (running or finished but not reset).
    pub fn current_job(&self) -> Option<Job> {
        self.inner.lock_slot().as_ref().map(|slot| slot.job.clone())
    }

    /// Whether a job is currently occupying the active slot.
    pub fn is_running(&self) -> bool {
        self.inner
            .lock_slot()
            .as_ref()
            .is_some_and(|slot| slot.job.state.is_active())
    }

    /// Start a job for `source`.
    ///
    /// Rejected with [`WorkerError::AlreadyRunning`] while another job is
    /// active and with [`WorkerError::SourceNotFound`] if `source` does not
    /// exist; neither rejection touches the current state.
    pub fn start(&self, source: impl Into<PathBuf>) -> WorkerResult<RunningJob> {
        let source = source.into();
        let mut slot = self.inner.lock_slot();

        if slot.as_ref().is_some_and(|s| s.job.state.is_active()) {
            return Err(WorkerError::AlreadyRunning);
        }
        if !source.is_file() {
            return Err(WorkerError::SourceNotFound(source));
        }

        let mut job = Job::new(source.clone());
        job.message = "Initializing workflow...".to_string();
        let token = CancellationToken::new();
        let handle = JobHandle {
            id: job.id.clone(),
            token: token.clone(),
        };

        self.inner.broadcaster.update(&job.status_update());
        *slot = Some(Slot {
            job,
            token: token.clone(),
        });
        drop(slot);

        metrics::record_job_started();
        let logger = JobLogger::new(&handle.id, &source);
        logger.log_start();

        let span = logger.create_span();
        let inner = self.inner.clone();
        let job_id = handle.id.clone();
        let task = tokio::spawn(
            async move { inner.run(job_id, source, token, logger).await }.instrument(span),
        );

        Ok(RunningJob { handle, task })
    }

    /// Request cooperative cancellation of the job behind `handle`.
    ///
    /// Returns false if that job is no longer the active one. The pipeline
    /// observes the request at its next phase or segment boundary.
    pub fn cancel(&self, handle: &JobHandle) -> bool {
        let slot = self.inner.lock_slot();
        match slot.as_ref() {
            Some(s) if s.job.id == handle.id && s.job.state.is_active() => {
                s.token.cancel();
                info!(job_id = %handle.id, "Cancellation requested");
                true
            }
            _ => false,
        }
    }

    /// Handle for the active job, if one is running.
    pub fn active_handle(&self) -> Option<JobHandle> {
        self.inner.lock_slot().as_ref().and_then(|s| {
            s.job.state.is_active().then(|| JobHandle {
                id: s.job.id.clone(),
                token: s.token.clone(),
            })
        })
    }

    /// Return to the idle snapshot from any state.
    ///
    /// A running job is cancelled and detached; on-disk artifacts are left
    /// untouched. A detached job keeps the dubbing agent until it reaches
    /// its next segment boundary, and a new job waits for it.
    pub fn reset(&self) -> StatusSnapshot {
        let mut slot = self.inner.lock_slot();
        if let Some(previous) = slot.take() {
            if previous.job.state.is_active() {
                previous.token.cancel();
                warn!(job_id = %previous.job.id, "Reset while running, job detached");
            }
        }
        self.inner.broadcaster.reset()
    }
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Option<Slot>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `f` to the job if it is still the current one, then publish
    /// its status. Returns false if the job was reset away.
    fn with_current_job(&self, job_id: &JobId, f: impl FnOnce(&mut Job) -> bool) -> bool {
        let mut slot = self.lock_slot();
        let Some(current) = slot.as_mut().filter(|s| &s.job.id == job_id) else {
            return false;
        };
        if f(&mut current.job) {
            self.broadcaster.update(&current.job.status_update());
        }
        true
    }

    /// Move to the next phase, or stop if the job was cancelled or reset.
    fn enter(&self, job_id: &JobId, token: &CancellationToken, state: JobState, message: &str, logger: &JobLogger) -> WorkerResult<()> {
        if token.is_cancelled() {
            return Err(WorkerError::Cancelled);
        }
        let mut advanced = false;
        let current = self.with_current_job(job_id, |job| {
            advanced = job.advance(state, message).is_ok();
            advanced
        });
        if !current || !advanced {
            return Err(WorkerError::Cancelled);
        }
        logger.log_phase(state.phase(), message);
        Ok(())
    }

    async fn run(self: Arc<Self>, job_id: JobId, source: PathBuf, token: CancellationToken, logger: JobLogger) -> WorkflowResult {
        let started = Instant::now();
        let outcome = self.pipeline(&job_id, &source, &token, &logger).await;
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Ok(result) => {
                let published = self.with_current_job(&job_id, |job| {
                    let ok = job.advance(JobState::Completed, "Workflow completed successfully").is_ok();
                    job.result = Some(result.clone());
                    ok
                });
                if published {
                    self.broadcaster.publish_result(result.clone());
                }
                metrics::record_job_finished("completed", elapsed);
                logger.log_completion(&display_opt(&result.final_video));
                result
            }
            Err(WorkerError::Cancelled) => {
                self.with_current_job(&job_id, |job| job.advance(JobState::Cancelled, "Workflow cancelled").is_ok());
                metrics::record_job_finished("cancelled", elapsed);
                logger.log_cancelled();
                WorkflowResult::failed("Workflow cancelled")
            }
            Err(e) => {
                let message = e.to_string();
                let result = WorkflowResult::failed(message.clone());
                let published = self.with_current_job(&job_id, |job| job.fail(message.clone()).is_ok());
                if published {
                    self.broadcaster.publish_result(result.clone());
                }
                metrics::record_job_finished("error", elapsed);
                logger.log_failure(&message);
                result
            }
        }
    }

    async fn pipeline(
        self: &Arc<Self>,
        job_id: &JobId,
        source: &Path,
        token: &CancellationToken,
        logger: &JobLogger,
    ) -> WorkerResult<WorkflowResult> {
        let reporter = JobReporter {
            inner: self.clone(),
            job_id: job_id.clone(),
            logger: logger.clone(),
        };

        self.layout.ensure_dirs().await?;

        self.enter(job_id, token, JobState::Splitting, "Splitting video into chunks...", logger)?;
        let segments = self
            .chunker
            .split(source, self.config.chunk_duration_secs, &reporter, token)
            .await?;
        let total = segments.len() as u32;

        self.enter(job_id, token, JobState::Dubbing, &format!("Dubbing {} chunk(s)...", total), logger)?;
        self.with_current_job(job_id, |job| {
            job.current_chunk = 0;
            job.total_chunks = total;
            true
        });
        let results = self.transformer.run_session(&segments, token, &reporter).await?;

        self.enter(job_id, token, JobState::Merging, "Merging dubbed chunks...", logger)?;
        let merged = self
            .reassembler
            .merge(&results, &self.layout.concat_list(), &self.layout.merged_dubbed(), token)
            .await?;

        self.enter(job_id, token, JobState::Extracting, "Extracting dubbed audio...", logger)?;
        let extension = self.reassembler.audio_settings().extension();
        let audio = self
            .reassembler
            .extract_audio(&merged, &self.layout.dubbed_audio(extension), token)
            .await?;

        self.enter(job_id, token, JobState::Replacing, "Replacing audio on the original video...", logger)?;
        let final_video = self
            .reassembler
            .replace_audio(
                source,
                &audio,
                &self.layout.final_video(&self.config.target_language),
                token,
            )
            .await?;

        let dubbed_chunks = TransformResult::ordered_outputs(&results)
            .into_iter()
            .map(|(_, path)| path)
            .collect();
        Ok(WorkflowResult::completed(dubbed_chunks, merged, audio, final_video))
    }
}

fn display_opt(path: &Option<PathBuf>) -> String {
    path.as_ref().map(|p| p.display().to_string()).unwrap_or_default()
}

/// Feeds collaborator progress into the job record of one job.
struct JobReporter {
    inner: Arc<Inner>,
    job_id: JobId,
    logger: JobLogger,
}

#[async_trait]
impl ProgressSink for JobReporter {
    async fn report(&self, report: ProgressReport) {
        self.logger.log_progress(&report.message, report.progress);
        self.inner.with_current_job(&self.job_id, |job| {
            job.record_progress(
                report.message.clone(),
                report.progress,
                report.current_chunk,
                report.total_chunks,
            )
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vdub_media::test_support::FakeTranscoder;

    /// Agent that never finishes logging in, so the job parks in dubbing.
    struct StuckAgent;

    #[async_trait]
    impl DubbingAgent for StuckAgent {
        async fn authenticate(&self) -> vdub_agent::AgentResult<()> {
            std::future::pending().await
        }

        async fn is_authenticated(&self) -> bool {
            false
        }

        async fn dub(&self, _request: &vdub_agent::DubRequest) -> vdub_agent::AgentResult<PathBuf> {
            std::future::pending().await
        }
    }

    fn orchestrator(root: &Path) -> Orchestrator {
        let config = WorkerConfig {
            input_dir: root.join("input"),
            output_dir: root.join("output"),
            temp_dir: root.join("temp"),
            dubbed_dir: root.join("dubbed"),
            ..Default::default()
        };
        Orchestrator::new(
            config,
            Arc::new(FakeTranscoder::with_duration(120.0)),
            Arc::new(StuckAgent),
            StatusBroadcaster::new(),
        )
    }

    #[tokio::test]
    async fn test_missing_source_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(tmp.path());

        let err = orchestrator.start(tmp.path().join("input/missing.mp4")).unwrap_err();
        assert!(matches!(err, WorkerError::SourceNotFound(_)));
        assert!(orchestrator.current_job().is_none());
        assert_eq!(orchestrator.status(), StatusSnapshot::idle());
    }

    #[tokio::test]
    async fn test_reset_detaches_running_job() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("video.mp4");
        tokio::fs::write(&source, b"source").await.unwrap();
        let orchestrator = orchestrator(tmp.path());

        let running = orchestrator.start(&source).unwrap();
        let handle = running.handle.clone();
        assert!(orchestrator.is_running());

        let snapshot = orchestrator.reset();
        assert_eq!(snapshot, StatusSnapshot::idle());
        assert!(handle.is_cancel_requested());
        assert!(!orchestrator.is_running());
        assert!(!orchestrator.cancel(&handle));

        // A new job may start right away.
        let next = orchestrator.start(&source).unwrap();
        assert_ne!(next.handle.id, handle.id);
    }
}

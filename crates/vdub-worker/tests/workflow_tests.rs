//! End-to-end workflow tests with in-memory collaborators.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Notify};
use vdub_agent::{AgentError, AgentResult, DubRequest, DubbingAgent};
use vdub_media::test_support::FakeTranscoder;
use vdub_media::{FfmpegCommand, MediaResult, Transcoder};
use vdub_models::{Phase, StatusEvent, StatusKind, StatusSnapshot};
use vdub_worker::{Orchestrator, StatusBroadcaster, WorkerConfig, WorkerError};

/// Agent that dubs instantly, except for scripted permanent failures.
#[derive(Default)]
struct TestAgent {
    failing: HashSet<u32>,
    calls: AtomicU32,
}

impl TestAgent {
    fn failing_on(indices: &[u32]) -> Self {
        Self {
            failing: indices.iter().copied().collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl DubbingAgent for TestAgent {
    async fn authenticate(&self) -> AgentResult<()> {
        Ok(())
    }

    async fn is_authenticated(&self) -> bool {
        true
    }

    async fn dub(&self, request: &DubRequest) -> AgentResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&request.segment_index) {
            return Err(vdub_agent::AgentError::DubbingFailed("scripted".into()));
        }
        write_output(&request.output).await;
        Ok(request.output.clone())
    }
}

/// Agent that blocks inside `dub` until released.
#[derive(Default)]
struct GatedAgent {
    entered: Notify,
    release: Notify,
    calls: AtomicU32,
}

#[async_trait]
impl DubbingAgent for GatedAgent {
    async fn authenticate(&self) -> AgentResult<()> {
        Ok(())
    }

    async fn is_authenticated(&self) -> bool {
        true
    }

    async fn dub(&self, request: &DubRequest) -> AgentResult<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        write_output(&request.output).await;
        Ok(request.output.clone())
    }
}

/// Agent with one session that notices overlapping calls. The first
/// `dub` call blocks until released.
#[derive(Default)]
struct ExclusiveAgent {
    logged_in: AtomicBool,
    logins: AtomicU32,
    in_flight: AtomicU32,
    overlapped: AtomicBool,
    calls: AtomicU32,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl DubbingAgent for ExclusiveAgent {
    async fn authenticate(&self) -> AgentResult<()> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        self.logged_in.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_authenticated(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    async fn dub(&self, request: &DubRequest) -> AgentResult<PathBuf> {
        if !self.logged_in.load(Ordering::SeqCst) {
            return Err(AgentError::NotAuthenticated);
        }
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.entered.notify_one();
            self.release.notified().await;
        }
        write_output(&request.output).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(request.output.clone())
    }

    async fn invalidate(&self) {
        self.logged_in.store(false, Ordering::SeqCst);
    }
}

/// Transcoder that blocks on the command writing `gate` until released.
struct GatedTranscoder {
    inner: FakeTranscoder,
    gate: &'static str,
    entered: Notify,
    release: Notify,
}

impl GatedTranscoder {
    fn new(inner: FakeTranscoder, gate: &'static str) -> Self {
        Self {
            inner,
            gate,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    fn ran_output(&self, name: &str) -> bool {
        self.inner
            .commands()
            .iter()
            .any(|c| c.output().file_name().is_some_and(|n| n == name))
    }
}

#[async_trait]
impl Transcoder for GatedTranscoder {
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        self.inner.probe_duration(path).await
    }

    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        if cmd.output().file_name().is_some_and(|n| n == self.gate) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.run(cmd).await
    }
}

async fn write_output(path: &Path) {
    tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    tokio::fs::write(path, b"dubbed").await.unwrap();
}

struct Fixture {
    _tmp: tempfile::TempDir,
    source: PathBuf,
    config: WorkerConfig,
    broadcaster: StatusBroadcaster,
}

impl Fixture {
    async fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let config = WorkerConfig {
            input_dir: root.join("input"),
            output_dir: root.join("output"),
            temp_dir: root.join("temp"),
            dubbed_dir: root.join("dubbed"),
            retry_delay: Duration::ZERO,
            ..Default::default()
        };
        tokio::fs::create_dir_all(&config.input_dir).await.unwrap();
        let source = config.input_dir.join("video.mp4");
        tokio::fs::write(&source, b"source video").await.unwrap();

        Self {
            _tmp: tmp,
            source,
            config,
            broadcaster: StatusBroadcaster::new(),
        }
    }

    fn orchestrator(&self, transcoder: Arc<dyn Transcoder>, agent: Arc<dyn DubbingAgent>) -> Orchestrator {
        Orchestrator::new(self.config.clone(), transcoder, agent, self.broadcaster.clone())
    }
}

fn drain(rx: &mut broadcast::Receiver<StatusEvent>) -> Vec<StatusEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn statuses(events: &[StatusEvent]) -> Vec<StatusSnapshot> {
    events
        .iter()
        .filter_map(|e| match e {
            StatusEvent::Status(s) => Some(s.clone()),
            StatusEvent::Result(_) => None,
        })
        .collect()
}

async fn wait_for_phase(orchestrator: &Orchestrator, phase: Phase) {
    for _ in 0..500 {
        if orchestrator.status().phase == phase {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("phase never became {:?}: {:?}", phase, orchestrator.status());
}

fn ran_merge(transcoder: &FakeTranscoder) -> bool {
    transcoder
        .commands()
        .iter()
        .any(|c| c.build_args().iter().any(|a| a == "concat"))
}

#[tokio::test]
async fn test_completed_workflow() {
    let fx = Fixture::new().await;
    let transcoder = Arc::new(FakeTranscoder::with_duration(125.0));
    let orchestrator = fx.orchestrator(transcoder.clone(), Arc::new(TestAgent::default()));
    let mut sub = fx.broadcaster.subscribe();

    let result = orchestrator.start(&fx.source).unwrap().wait().await;

    assert!(result.success, "{:?}", result.error);
    let layout = orchestrator.layout();
    assert_eq!(
        result.dubbed_chunks,
        Some(vec![
            layout.dubbed_chunk_path(0),
            layout.dubbed_chunk_path(1),
            layout.dubbed_chunk_path(2),
        ])
    );
    assert_eq!(result.merged_dubbed_video, Some(layout.merged_dubbed()));
    assert_eq!(result.dubbed_audio, Some(layout.dubbed_audio("mp3")));
    assert_eq!(result.final_video, Some(layout.final_video("Hungarian")));

    let snapshot = orchestrator.status();
    assert_eq!(snapshot.status, StatusKind::Completed);
    assert_eq!(snapshot.phase, Phase::Completed);
    assert_eq!(snapshot.progress, 100.0);
    assert_eq!(snapshot.total_chunks, 3);

    let events = drain(&mut sub.events);
    assert!(matches!(events.last(), Some(StatusEvent::Result(r)) if r.success));

    // Phases appear in order, never going back.
    let mut phases: Vec<Phase> = statuses(&events).iter().map(|s| s.phase).collect();
    phases.dedup();
    assert_eq!(
        phases,
        vec![
            Phase::Initializing,
            Phase::Splitting,
            Phase::Dubbing,
            Phase::Merging,
            Phase::Extracting,
            Phase::Replacing,
            Phase::Completed,
        ]
    );

    // Progress never decreases within a phase.
    for pair in statuses(&events).windows(2) {
        if pair[0].phase == pair[1].phase {
            assert!(pair[1].progress >= pair[0].progress, "{:?}", pair);
        }
    }
}

#[tokio::test]
async fn test_dubbing_progress_per_chunk() {
    let fx = Fixture::new().await;
    let orchestrator = fx.orchestrator(
        Arc::new(FakeTranscoder::with_duration(300.0)),
        Arc::new(TestAgent::default()),
    );
    let mut sub = fx.broadcaster.subscribe();

    orchestrator.start(&fx.source).unwrap().wait().await;

    let dubbed: Vec<(u32, f64)> = statuses(&drain(&mut sub.events))
        .into_iter()
        .filter(|s| s.phase == Phase::Dubbing && s.message.starts_with("Chunk "))
        .map(|s| (s.current_chunk, s.progress))
        .collect();
    assert_eq!(
        dubbed,
        vec![(1, 20.0), (2, 40.0), (3, 60.0), (4, 80.0), (5, 100.0)]
    );
}

#[tokio::test]
async fn test_partial_failure_still_completes() {
    let fx = Fixture::new().await;
    let agent = Arc::new(TestAgent::failing_on(&[1]));
    let orchestrator = fx.orchestrator(Arc::new(FakeTranscoder::with_duration(240.0)), agent.clone());

    let result = orchestrator.start(&fx.source).unwrap().wait().await;

    assert!(result.success);
    let chunks = result.dubbed_chunks.unwrap();
    assert_eq!(chunks.len(), 3);
    assert!(!chunks.contains(&orchestrator.layout().dubbed_chunk_path(1)));
    // Segment 1 used its whole retry budget.
    assert_eq!(agent.calls.load(Ordering::SeqCst), 3 + 3);
    assert_eq!(orchestrator.status().status, StatusKind::Completed);
}

#[tokio::test]
async fn test_all_segments_failing_is_an_error() {
    let fx = Fixture::new().await;
    let transcoder = Arc::new(FakeTranscoder::with_duration(120.0));
    let orchestrator = fx.orchestrator(transcoder.clone(), Arc::new(TestAgent::failing_on(&[0, 1])));
    let mut sub = fx.broadcaster.subscribe();

    let result = orchestrator.start(&fx.source).unwrap().wait().await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("No chunk could be dubbed"));
    assert!(result.final_video.is_none());
    assert!(!ran_merge(&transcoder));

    let snapshot = orchestrator.status();
    assert_eq!(snapshot.status, StatusKind::Error);
    assert_eq!(snapshot.phase, Phase::Error);
    assert!(snapshot.message.contains("No chunk could be dubbed"));

    let events = drain(&mut sub.events);
    assert!(!events
        .iter()
        .any(|e| matches!(e, StatusEvent::Result(r) if r.success)));
    assert!(matches!(events.last(), Some(StatusEvent::Result(r)) if !r.success));
}

#[tokio::test]
async fn test_unreadable_duration_is_an_error() {
    let fx = Fixture::new().await;
    let agent = Arc::new(TestAgent::default());
    let orchestrator = fx.orchestrator(Arc::new(FakeTranscoder::without_duration()), agent.clone());

    let result = orchestrator.start(&fx.source).unwrap().wait().await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("duration"));
    assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
    assert_eq!(orchestrator.status().status, StatusKind::Error);
}

#[tokio::test]
async fn test_cancel_during_dubbing() {
    let fx = Fixture::new().await;
    let transcoder = Arc::new(FakeTranscoder::with_duration(180.0));
    let agent = Arc::new(GatedAgent::default());
    let orchestrator = fx.orchestrator(transcoder.clone(), agent.clone());

    let running = orchestrator.start(&fx.source).unwrap();
    let handle = running.handle.clone();
    agent.entered.notified().await;
    assert_eq!(orchestrator.status().phase, Phase::Dubbing);

    assert!(orchestrator.cancel(&handle));
    // The in-flight call is allowed to finish.
    agent.release.notify_one();
    let result = running.wait().await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Workflow cancelled"));
    assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
    assert!(!ran_merge(&transcoder));

    let snapshot = orchestrator.status();
    assert_eq!(snapshot.status, StatusKind::Cancelled);
    assert_eq!(snapshot.phase, Phase::Cancelled);
    assert_eq!(snapshot.progress, 0.0);
    assert!(orchestrator.active_handle().is_none());
    // A finished job can no longer be cancelled.
    assert!(!orchestrator.cancel(&handle));
}

#[tokio::test]
async fn test_start_while_running_is_rejected() {
    let fx = Fixture::new().await;
    let agent = Arc::new(GatedAgent::default());
    let orchestrator = fx.orchestrator(Arc::new(FakeTranscoder::with_duration(60.0)), agent.clone());

    let running = orchestrator.start(&fx.source).unwrap();
    agent.entered.notified().await;
    let before = orchestrator.status();

    let err = orchestrator.start(&fx.source).unwrap_err();
    assert!(matches!(err, WorkerError::AlreadyRunning));
    assert_eq!(orchestrator.status(), before);
    assert_eq!(orchestrator.current_job().unwrap().id, running.handle.id);

    agent.release.notify_one();
    assert!(running.wait().await.success);
}

#[tokio::test]
async fn test_reset_after_terminal_states() {
    let fx = Fixture::new().await;

    for agent in [TestAgent::default(), TestAgent::failing_on(&[0])] {
        let orchestrator = fx.orchestrator(Arc::new(FakeTranscoder::with_duration(30.0)), Arc::new(agent));
        orchestrator.start(&fx.source).unwrap().wait().await;
        assert_ne!(orchestrator.status().status, StatusKind::Idle);

        let snapshot = orchestrator.reset();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "idle",
                "message": "",
                "progress": 0.0,
                "current_chunk": 0,
                "total_chunks": 0,
                "phase": "waiting"
            })
        );
        assert!(orchestrator.current_job().is_none());
    }
}

#[tokio::test]
async fn test_new_job_after_completion() {
    let fx = Fixture::new().await;
    let orchestrator = fx.orchestrator(
        Arc::new(FakeTranscoder::with_duration(30.0)),
        Arc::new(TestAgent::default()),
    );

    let first = orchestrator.start(&fx.source).unwrap();
    let first_id = first.handle.id.clone();
    assert!(first.wait().await.success);

    let second = orchestrator.start(&fx.source).unwrap();
    assert_ne!(second.handle.id, first_id);
    assert!(second.wait().await.success);
}

#[tokio::test]
async fn test_cancel_during_splitting() {
    let fx = Fixture::new().await;
    let transcoder = Arc::new(GatedTranscoder::new(FakeTranscoder::with_duration(600.0), "chunk_0000.mp4"));
    let agent = Arc::new(TestAgent::default());
    let orchestrator = fx.orchestrator(transcoder.clone(), agent.clone());

    let running = orchestrator.start(&fx.source).unwrap();
    transcoder.entered.notified().await;
    assert_eq!(orchestrator.status().phase, Phase::Splitting);

    assert!(orchestrator.cancel(&running.handle));
    transcoder.release.notify_one();
    let result = running.wait().await;

    assert_eq!(result.error.as_deref(), Some("Workflow cancelled"));
    // The cut in flight finished; none of the other nine started.
    assert_eq!(transcoder.inner.commands().len(), 1);
    assert_eq!(agent.calls.load(Ordering::SeqCst), 0);

    let snapshot = orchestrator.status();
    assert_eq!(snapshot.status, StatusKind::Cancelled);
    assert_eq!(snapshot.progress, 0.0);
}

#[tokio::test]
async fn test_cancel_during_merge_skips_later_phases() {
    let fx = Fixture::new().await;
    let transcoder = Arc::new(GatedTranscoder::new(FakeTranscoder::with_duration(120.0), "merged_dubbed.mp4"));
    let orchestrator = fx.orchestrator(transcoder.clone(), Arc::new(TestAgent::default()));
    let mut sub = fx.broadcaster.subscribe();

    let running = orchestrator.start(&fx.source).unwrap();
    transcoder.entered.notified().await;
    assert_eq!(orchestrator.status().phase, Phase::Merging);

    assert!(orchestrator.cancel(&running.handle));
    transcoder.release.notify_one();
    let result = running.wait().await;

    assert_eq!(result.error.as_deref(), Some("Workflow cancelled"));
    assert!(transcoder.ran_output("merged_dubbed.mp4"));
    assert!(!transcoder.ran_output("dubbed_audio.mp3"));
    assert!(!transcoder.ran_output("final_video_hungarian.mp4"));
    assert_eq!(orchestrator.status().status, StatusKind::Cancelled);

    let events = drain(&mut sub.events);
    assert!(!events.iter().any(|e| matches!(e, StatusEvent::Result(_))));
}

#[tokio::test]
async fn test_reset_while_running_then_new_job() {
    let fx = Fixture::new().await;
    let agent = Arc::new(ExclusiveAgent::default());
    let orchestrator = fx.orchestrator(Arc::new(FakeTranscoder::with_duration(180.0)), agent.clone());

    let first = orchestrator.start(&fx.source).unwrap();
    agent.entered.notified().await;
    assert_eq!(orchestrator.reset(), StatusSnapshot::idle());

    // The detached job still holds the agent; the new one waits for it.
    let second = orchestrator.start(&fx.source).unwrap();
    wait_for_phase(&orchestrator, Phase::Dubbing).await;
    assert_eq!(agent.calls.load(Ordering::SeqCst), 1);

    agent.release.notify_one();
    let first = first.wait().await;
    let second = second.wait().await;

    assert_eq!(first.error.as_deref(), Some("Workflow cancelled"));
    assert!(second.success, "{:?}", second.error);
    assert_eq!(second.dubbed_chunks.map(|c| c.len()), Some(3));
    assert!(!agent.overlapped.load(Ordering::SeqCst));
    assert_eq!(agent.logins.load(Ordering::SeqCst), 2);
    assert_eq!(agent.calls.load(Ordering::SeqCst), 4);

    let snapshot = orchestrator.status();
    assert_eq!(snapshot.status, StatusKind::Completed);
    assert_eq!(snapshot.total_chunks, 3);
}

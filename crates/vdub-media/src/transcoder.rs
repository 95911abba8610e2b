//! Transcoder collaborator.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_duration;

/// Histogram of transcoder call durations in seconds.
pub const TRANSCODER_CALL_SECONDS: &str = "vdub_transcoder_call_seconds";

/// The media tool the chunker and reassembler drive.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Container duration of `path` in seconds.
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64>;

    /// Run one command to completion.
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()>;
}

/// [`Transcoder`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any single ffmpeg call that runs longer than `secs`.
    pub fn with_timeout(secs: Option<u64>) -> Self {
        let runner = match secs {
            Some(secs) => FfmpegRunner::new().with_timeout(secs),
            None => FfmpegRunner::new(),
        };
        Self { runner }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        let started = Instant::now();
        let result = probe_duration(path).await;
        record_call("probe", started, result.is_ok());
        result
    }

    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let started = Instant::now();
        let result = self.runner.run(cmd).await;
        record_call("ffmpeg", started, result.is_ok());
        result
    }
}

fn record_call(tool: &'static str, started: Instant, ok: bool) {
    metrics::histogram!(
        TRANSCODER_CALL_SECONDS,
        "tool" => tool,
        "outcome" => if ok { "success" } else { "failure" }
    )
    .record(started.elapsed().as_secs_f64());
}

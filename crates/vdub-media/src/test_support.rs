//! In-memory fakes of the media collaborators for tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::progress::{ProgressReport, ProgressSink};
use crate::transcoder::Transcoder;

/// Transcoder that writes placeholder bytes to each command's output.
///
/// Outputs are matched by file name: `failing_on` makes the call fail,
/// `empty_on` writes a zero-length file, `flaky_on` fails the first `n`
/// calls for that output.
#[derive(Debug, Default)]
pub struct FakeTranscoder {
    duration: Option<f64>,
    failing: HashSet<String>,
    empty: HashSet<String>,
    flaky: Mutex<HashMap<String, u32>>,
    commands: Mutex<Vec<FfmpegCommand>>,
}

impl FakeTranscoder {
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration: Some(duration),
            ..Default::default()
        }
    }

    pub fn without_duration() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, file_name: &str) -> Self {
        self.failing.insert(file_name.to_string());
        self
    }

    pub fn empty_on(mut self, file_name: &str) -> Self {
        self.empty.insert(file_name.to_string());
        self
    }

    pub fn flaky_on(self, file_name: &str, failures: u32) -> Self {
        if let Ok(mut flaky) = self.flaky.lock() {
            flaky.insert(file_name.to_string(), failures);
        }
        self
    }

    /// Every command run so far, in call order.
    pub fn commands(&self) -> Vec<FfmpegCommand> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn take_flaky_failure(&self, name: &str) -> bool {
        let Ok(mut flaky) = self.flaky.lock() else {
            return false;
        };
        match flaky.get_mut(name) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn probe_duration(&self, path: &Path) -> MediaResult<f64> {
        self.duration.ok_or_else(|| {
            MediaError::duration_unavailable(format!("no duration for {}", path.display()))
        })
    }

    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(cmd.clone());
        }

        let output = cmd.output();
        let name = output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if self.failing.contains(&name) || self.take_flaky_failure(&name) {
            return Err(MediaError::ffmpeg_failed(
                format!("fake failure for {}", name),
                None,
                Some(1),
            ));
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes: &[u8] = if self.empty.contains(&name) {
            b""
        } else {
            b"fake media"
        };
        tokio::fs::write(output, bytes).await?;
        Ok(())
    }
}

/// Progress sink that keeps every report.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    reports: Mutex<Vec<ProgressReport>>,
}

impl RecordingProgress {
    pub fn reports(&self) -> Vec<ProgressReport> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn values(&self) -> Vec<f64> {
        self.reports().iter().map(|r| r.progress).collect()
    }
}

#[async_trait]
impl ProgressSink for RecordingProgress {
    async fn report(&self, report: ProgressReport) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report);
        }
    }
}

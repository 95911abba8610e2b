//! Merging dubbed segments and splicing the new audio onto the source.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use vdub_models::TransformResult;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::require_output;
use crate::retry::{retry_async_when, RetryPolicy, RetryResult};
use crate::transcoder::Transcoder;

/// Target codec for the extracted audio track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSettings {
    /// FFmpeg encoder name
    pub codec: String,
    /// Bitrate, e.g. `192k`
    pub bitrate: String,
}

impl AudioSettings {
    pub fn new(codec: impl Into<String>, bitrate: impl Into<String>) -> Self {
        Self {
            codec: codec.into(),
            bitrate: bitrate.into(),
        }
    }

    /// File extension matching the codec.
    pub fn extension(&self) -> &'static str {
        match self.codec.as_str() {
            "libmp3lame" | "mp3" => "mp3",
            "aac" | "libfdk_aac" => "m4a",
            "libopus" | "opus" => "opus",
            "libvorbis" | "vorbis" => "ogg",
            "flac" => "flac",
            c if c.starts_with("pcm_") => "wav",
            _ => "mka",
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self::new("libmp3lame", "192k")
    }
}

/// One line of an ffconcat list: `file '<absolute path>'`.
///
/// Single quotes in the path are closed, escaped and reopened (`'\''`).
pub fn concat_list_entry(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let escaped = absolute.to_string_lossy().replace('\'', r"'\''");
    format!("file '{}'", escaped)
}

/// Wrap a failed step in its fatal variant. Cancellation passes through.
fn step_error(error: MediaError, wrap: fn(String) -> MediaError) -> MediaError {
    match error {
        MediaError::Cancelled => error,
        other => wrap(other.to_string()),
    }
}

/// Runs the three reassembly steps, each under the retry policy.
///
/// Every step checks its cancellation token before each attempt.
#[derive(Clone)]
pub struct Reassembler {
    transcoder: Arc<dyn Transcoder>,
    policy: RetryPolicy,
    audio: AudioSettings,
}

impl Reassembler {
    pub fn new(transcoder: Arc<dyn Transcoder>, policy: RetryPolicy, audio: AudioSettings) -> Self {
        Self {
            transcoder,
            policy,
            audio,
        }
    }

    pub fn audio_settings(&self) -> &AudioSettings {
        &self.audio
    }

    /// Concatenate the successful results in ascending index order.
    ///
    /// The input is re-sorted whatever order it arrives in.
    pub async fn merge(
        &self,
        results: &[TransformResult],
        list_file: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<PathBuf> {
        let ordered = TransformResult::ordered_outputs(results);
        if ordered.is_empty() {
            return Err(MediaError::MergeFailed("no dubbed chunks to merge".to_string()));
        }

        let mut list = String::new();
        for (_, path) in &ordered {
            list.push_str(&concat_list_entry(path));
            list.push('\n');
        }
        if let Some(parent) = list_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(list_file, list).await?;

        info!("Merging {} dubbed chunk(s) into {}", ordered.len(), output.display());

        let cmd = FfmpegCommand::new(list_file, output)
            .concat_demuxer()
            .video_codec("libx264")
            .audio_codec("aac");

        self.run_checked("merge", &cmd, cancel)
            .await
            .map_err(|e| step_error(e, MediaError::MergeFailed))?;
        Ok(output.to_path_buf())
    }

    /// Pull the audio stream of `video` into `output`.
    pub async fn extract_audio(
        &self,
        video: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<PathBuf> {
        info!("Extracting audio from {}", video.display());

        let cmd = FfmpegCommand::new(video, output)
            .no_video()
            .audio_codec(self.audio.codec.clone())
            .audio_bitrate(self.audio.bitrate.clone());

        self.run_checked("extract_audio", &cmd, cancel)
            .await
            .map_err(|e| step_error(e, MediaError::AudioExtractionFailed))?;
        Ok(output.to_path_buf())
    }

    /// Keep the video stream of `video` untouched and replace its audio
    /// with `audio`, truncated to the shorter stream.
    pub async fn replace_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<PathBuf> {
        info!("Replacing audio of {} with {}", video.display(), audio.display());

        let cmd = FfmpegCommand::new(video, output)
            .add_input(audio)
            .video_codec("copy")
            .map("0:v:0")
            .map("1:a:0")
            .shortest();

        self.run_checked("replace_audio", &cmd, cancel)
            .await
            .map_err(|e| step_error(e, MediaError::AudioReplacementFailed))?;
        Ok(output.to_path_buf())
    }

    async fn run_checked(&self, operation: &str, cmd: &FfmpegCommand, cancel: &CancellationToken) -> MediaResult<()> {
        let result = retry_async_when(
            &self.policy,
            operation,
            || async {
                if cancel.is_cancelled() {
                    return Err(MediaError::Cancelled);
                }
                self.transcoder.run(cmd).await?;
                require_output(cmd.output()).await
            },
            |e| !matches!(e, MediaError::Cancelled),
        )
        .await;

        match result {
            RetryResult::Success { .. } => Ok(()),
            RetryResult::Failed { error, .. } => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::WorkspaceLayout;
    use crate::test_support::FakeTranscoder;
    use std::time::Duration;

    fn reassembler(transcoder: Arc<FakeTranscoder>) -> Reassembler {
        Reassembler::new(
            transcoder,
            RetryPolicy::new(3, Duration::from_secs(5)),
            AudioSettings::default(),
        )
    }

    #[test]
    fn test_concat_list_entry_escapes_quotes() {
        assert_eq!(
            concat_list_entry(Path::new("/work/dubbed/it's.mp4")),
            r"file '/work/dubbed/it'\''s.mp4'"
        );
        assert!(concat_list_entry(Path::new("relative.mp4")).starts_with("file '/"));
    }

    #[test]
    fn test_audio_extension() {
        assert_eq!(AudioSettings::default().extension(), "mp3");
        assert_eq!(AudioSettings::new("pcm_s16le", "1411k").extension(), "wav");
        assert_eq!(AudioSettings::new("aac", "128k").extension(), "m4a");
    }

    #[tokio::test]
    async fn test_merge_orders_by_index() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::under(tmp.path());
        let transcoder = Arc::new(FakeTranscoder::with_duration(10.0));

        let results = vec![
            TransformResult::succeeded(2, layout.dubbed_chunk_path(2), 1),
            TransformResult::succeeded(0, layout.dubbed_chunk_path(0), 1),
            TransformResult::failed(3, 3),
            TransformResult::succeeded(1, layout.dubbed_chunk_path(1), 2),
        ];

        let merged = reassembler(transcoder.clone())
            .merge(&results, &layout.concat_list(), &layout.merged_dubbed(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(merged, layout.merged_dubbed());

        let list = tokio::fs::read_to_string(layout.concat_list()).await.unwrap();
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("dubbed_chunk_0000.mp4'"));
        assert!(lines[1].ends_with("dubbed_chunk_0001.mp4'"));
        assert!(lines[2].ends_with("dubbed_chunk_0002.mp4'"));

        let args = transcoder.commands()[0].build_args();
        assert!(args.windows(2).any(|w| w == ["-f", "concat"]));
    }

    #[tokio::test]
    async fn test_merge_without_successes_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::under(tmp.path());
        let transcoder = Arc::new(FakeTranscoder::with_duration(10.0));

        let err = reassembler(transcoder.clone())
            .merge(&[TransformResult::failed(0, 3)], &layout.concat_list(), &layout.merged_dubbed(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::MergeFailed(_)));
        assert!(transcoder.commands().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_extract_audio_retries_transient_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::under(tmp.path());
        let transcoder = Arc::new(FakeTranscoder::with_duration(10.0).flaky_on("dubbed_audio.mp3", 2));

        let audio = reassembler(transcoder.clone())
            .extract_audio(&layout.merged_dubbed(), &layout.dubbed_audio("mp3"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(audio, layout.dubbed_audio("mp3"));
        assert_eq!(transcoder.commands().len(), 3);
        let args = transcoder.commands()[0].build_args();
        assert!(args.contains(&"-vn".to_string()));
        assert!(args.contains(&"libmp3lame".to_string()));
        assert!(args.contains(&"192k".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_output_counts_as_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::under(tmp.path());
        let transcoder = Arc::new(FakeTranscoder::with_duration(10.0).empty_on("dubbed_audio.mp3"));

        let err = reassembler(transcoder.clone())
            .extract_audio(&layout.merged_dubbed(), &layout.dubbed_audio("mp3"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::AudioExtractionFailed(_)));
        assert_eq!(transcoder.commands().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_audio_maps_streams() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::under(tmp.path());
        let transcoder = Arc::new(FakeTranscoder::with_duration(10.0));
        let source = tmp.path().join("input/video.mp4");

        let final_video = reassembler(transcoder.clone())
            .replace_audio(
                &source,
                &layout.dubbed_audio("mp3"),
                &layout.final_video("Hungarian"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(final_video, layout.final_video("Hungarian"));

        let cmd = &transcoder.commands()[0];
        assert_eq!(cmd.inputs(), vec![source.as_path(), layout.dubbed_audio("mp3").as_path()]);
        let args = cmd.build_args();
        assert!(args.windows(2).any(|w| w == ["-c:v", "copy"]));
        assert!(args.windows(2).any(|w| w == ["-map", "0:v:0"]));
        assert!(args.windows(2).any(|w| w == ["-map", "1:a:0"]));
        assert!(args.contains(&"-shortest".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_audio_failure_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::under(tmp.path());
        let transcoder = Arc::new(FakeTranscoder::with_duration(10.0).failing_on("final_video_hungarian.mp4"));

        let err = reassembler(transcoder)
            .replace_audio(
                Path::new("input/video.mp4"),
                &layout.dubbed_audio("mp3"),
                &layout.final_video("Hungarian"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::AudioReplacementFailed(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_between_attempts_stops_retrying() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::under(tmp.path());
        let transcoder = Arc::new(FakeTranscoder::with_duration(10.0).flaky_on("dubbed_audio.mp3", 2));
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = reassembler(transcoder.clone())
            .extract_audio(&layout.merged_dubbed(), &layout.dubbed_audio("mp3"), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Cancelled));
        assert!(!err.is_fatal());
        assert_eq!(transcoder.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_merge_runs_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::under(tmp.path());
        let transcoder = Arc::new(FakeTranscoder::with_duration(10.0));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = reassembler(transcoder.clone())
            .merge(
                &[TransformResult::succeeded(0, layout.dubbed_chunk_path(0), 1)],
                &layout.concat_list(),
                &layout.merged_dubbed(),
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Cancelled));
        assert!(transcoder.commands().is_empty());
    }
}

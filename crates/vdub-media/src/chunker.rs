//! Splitting a source video into ordered fixed-duration segments.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vdub_models::Segment;

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{non_empty_file, reset_dir};
use crate::layout::WorkspaceLayout;
use crate::progress::{step_progress, ProgressReport, ProgressSink};
use crate::transcoder::Transcoder;

/// Number of segments for a source of `duration_secs` cut every
/// `chunk_secs`: `ceil(duration / chunk)`, at least 1.
pub fn chunk_count(duration_secs: f64, chunk_secs: f64) -> u32 {
    if chunk_secs.is_nan() || chunk_secs <= 0.0 || duration_secs.is_nan() || duration_secs <= 0.0 {
        return 1;
    }
    ((duration_secs / chunk_secs).ceil() as u32).max(1)
}

/// Cuts a source artifact into segment artifacts under the scratch area.
#[derive(Clone)]
pub struct Chunker {
    transcoder: Arc<dyn Transcoder>,
    layout: WorkspaceLayout,
}

impl Chunker {
    pub fn new(transcoder: Arc<dyn Transcoder>, layout: WorkspaceLayout) -> Self {
        Self { transcoder, layout }
    }

    /// Split `source` into segments of `chunk_secs`.
    ///
    /// The chunks directory is emptied first. Cuts that fail or come out
    /// empty are skipped; the surviving segments are indexed densely from 0.
    /// `cancel` is checked before every cut; a cut already running finishes.
    pub async fn split(
        &self,
        source: &Path,
        chunk_secs: f64,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> MediaResult<Vec<Segment>> {
        let duration = self.transcoder.probe_duration(source).await.map_err(|e| match e {
            MediaError::DurationUnavailable(_) => e,
            other => MediaError::duration_unavailable(other.to_string()),
        })?;

        let count = chunk_count(duration, chunk_secs);
        info!(
            "Splitting {} ({:.1}s) into {} chunk(s) of {}s",
            source.display(),
            duration,
            count,
            chunk_secs
        );

        let chunks_dir = self.layout.chunks_dir();
        reset_dir(&chunks_dir).await?;

        let mut segments = Vec::with_capacity(count as usize);
        for slot in 0..count {
            if cancel.is_cancelled() {
                info!("Split cancelled after {}/{} cut(s)", slot, count);
                return Err(MediaError::Cancelled);
            }
            let offset = slot as f64 * chunk_secs;
            let length = chunk_secs.min(duration - offset);
            let path = self.layout.chunk_path(slot);

            let cmd = FfmpegCommand::new(source, &path)
                .seek(offset)
                .duration(length)
                .video_codec("libx264")
                .audio_codec("aac");

            match self.transcoder.run(&cmd).await {
                Ok(()) if non_empty_file(&path).await => {
                    let index = segments.len() as u32;
                    debug!("Created chunk {} from slot {}: {}", index, slot, path.display());
                    segments.push(Segment::new(index, offset, length, path));
                }
                Ok(()) => warn!("Chunk {} produced no output, skipping", slot),
                Err(e) => warn!("Chunk {} failed, skipping: {}", slot, e),
            }

            progress
                .report(ProgressReport::new(
                    format!("Created chunk {}/{}", slot + 1, count),
                    step_progress(slot as usize, count as usize),
                ))
                .await;
        }

        if segments.is_empty() {
            return Err(MediaError::NoSegmentsProduced(source.to_path_buf()));
        }

        info!("Split produced {}/{} chunk(s)", segments.len(), count);
        Ok(segments)
    }
}

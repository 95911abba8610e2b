#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the dubbing workflow.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - A [`Transcoder`] seam over the `ffmpeg`/`ffprobe` binaries
//! - Fixed-delay bounded retry
//! - Chunking a source video into ordered segments
//! - Reassembling dubbed segments and splicing the audio back

pub mod chunker;
pub mod command;
pub mod error;
pub mod fs_utils;
pub mod layout;
pub mod probe;
pub mod progress;
pub mod reassembler;
pub mod retry;
pub mod transcoder;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use chunker::{chunk_count, Chunker};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use layout::WorkspaceLayout;
pub use probe::{parse_duration, probe_duration};
pub use progress::{step_progress, NoopProgress, ProgressReport, ProgressSink};
pub use reassembler::{concat_list_entry, AudioSettings, Reassembler};
pub use retry::{retry_async, retry_async_when, RetryPolicy, RetryResult};
pub use transcoder::{FfmpegTranscoder, Transcoder};

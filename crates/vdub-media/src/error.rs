//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Could not determine video duration: {0}")]
    DurationUnavailable(String),

    #[error("No segments were produced from {0}")]
    NoSegmentsProduced(PathBuf),

    #[error("Merging dubbed chunks failed: {0}")]
    MergeFailed(String),

    #[error("Audio extraction failed: {0}")]
    AudioExtractionFailed(String),

    #[error("Audio replacement failed: {0}")]
    AudioReplacementFailed(String),

    #[error("Output missing or empty: {0}")]
    MissingOutput(PathBuf),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a duration-unavailable error.
    pub fn duration_unavailable(message: impl Into<String>) -> Self {
        Self::DurationUnavailable(message.into())
    }

    /// Whether this error aborts the whole job rather than a single unit.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MediaError::DurationUnavailable(_)
                | MediaError::NoSegmentsProduced(_)
                | MediaError::MergeFailed(_)
                | MediaError::AudioExtractionFailed(_)
                | MediaError::AudioReplacementFailed(_)
                | MediaError::FfmpegNotFound
                | MediaError::FfprobeNotFound
        )
    }
}

//! Segment and transform result types.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One time-bounded slice of the source video.
///
/// Indices are dense and start at 0 within a job. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    /// Sequence index (0-based)
    pub index: u32,
    /// Offset into the source in seconds
    pub offset_secs: f64,
    /// Duration in seconds
    pub duration_secs: f64,
    /// Segment artifact
    pub path: PathBuf,
}

impl Segment {
    pub fn new(index: u32, offset_secs: f64, duration_secs: f64, path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            offset_secs,
            duration_secs,
            path: path.into(),
        }
    }
}

/// Outcome of transforming one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TransformResult {
    /// Index of the originating segment
    pub index: u32,
    /// Whether the transform produced an artifact
    pub success: bool,
    /// Produced artifact (present only on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    /// Attempts spent on this segment
    pub attempts: u32,
}

impl TransformResult {
    pub fn succeeded(index: u32, output: impl Into<PathBuf>, attempts: u32) -> Self {
        Self {
            index,
            success: true,
            output: Some(output.into()),
            attempts,
        }
    }

    pub fn failed(index: u32, attempts: u32) -> Self {
        Self {
            index,
            success: false,
            output: None,
            attempts,
        }
    }

    /// Successful artifacts in ascending index order, whatever the input order.
    pub fn ordered_outputs(results: &[TransformResult]) -> Vec<(u32, PathBuf)> {
        let mut outputs: Vec<(u32, PathBuf)> = results
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| r.output.clone().map(|path| (r.index, path)))
            .collect();
        outputs.sort_by_key(|(index, _)| *index);
        outputs
    }
}

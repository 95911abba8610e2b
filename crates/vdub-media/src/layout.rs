//! Deterministic on-disk layout of a dubbing workspace.

use std::path::{Path, PathBuf};

use crate::error::MediaResult;

/// Directories and artifact names used by the workflow.
///
/// ```text
/// input/                      uploaded sources
/// output/                     non-dubbed intermediates
/// temp/chunks/chunk_0000.mp4  cut segments
/// temp/concat_list.txt        merge directive
/// dubbed/dubbed_chunk_0000.mp4
/// dubbed/merged_dubbed.mp4
/// dubbed/dubbed_audio.mp3
/// dubbed/final_video_<lang>.mp4
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub dubbed_dir: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
        dubbed_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            temp_dir: temp_dir.into(),
            dubbed_dir: dubbed_dir.into(),
        }
    }

    /// Layout with the four standard directories under `root`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::new(
            root.join("input"),
            root.join("output"),
            root.join("temp"),
            root.join("dubbed"),
        )
    }

    /// Scratch directory holding cut segments.
    pub fn chunks_dir(&self) -> PathBuf {
        self.temp_dir.join("chunks")
    }

    /// Path of the cut segment in slot `slot`.
    pub fn chunk_path(&self, slot: u32) -> PathBuf {
        self.chunks_dir().join(format!("chunk_{:04}.mp4", slot))
    }

    /// Concatenation list consumed by the merge step.
    pub fn concat_list(&self) -> PathBuf {
        self.temp_dir.join("concat_list.txt")
    }

    /// Pre-agreed output path for the dubbed segment `index`.
    pub fn dubbed_chunk_path(&self, index: u32) -> PathBuf {
        self.dubbed_dir.join(format!("dubbed_chunk_{:04}.mp4", index))
    }

    pub fn merged_dubbed(&self) -> PathBuf {
        self.dubbed_dir.join("merged_dubbed.mp4")
    }

    pub fn dubbed_audio(&self, extension: &str) -> PathBuf {
        self.dubbed_dir.join(format!("dubbed_audio.{}", extension))
    }

    pub fn final_video(&self, language: &str) -> PathBuf {
        self.dubbed_dir
            .join(format!("final_video_{}.mp4", language_slug(language)))
    }

    /// Create every directory of the layout.
    pub async fn ensure_dirs(&self) -> MediaResult<()> {
        for dir in [
            &self.input_dir,
            &self.output_dir,
            &self.temp_dir,
            &self.dubbed_dir,
        ] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}

impl Default for WorkspaceLayout {
    fn default() -> Self {
        Self::new("./input", "./output", "./temp", "./dubbed")
    }
}

fn language_slug(language: &str) -> String {
    let slug: String = language
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if slug.is_empty() {
        "dubbed".to_string()
    } else {
        slug
    }
}

//! Filesystem helpers for workflow artifacts.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Whether `path` is a regular file with at least one byte.
pub async fn non_empty_file(path: impl AsRef<Path>) -> bool {
    match fs::metadata(path.as_ref()).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Fail with [`MediaError::MissingOutput`] unless `path` is a non-empty file.
pub async fn require_output(path: impl AsRef<Path>) -> MediaResult<()> {
    let path = path.as_ref();
    if non_empty_file(path).await {
        Ok(())
    } else {
        Err(MediaError::MissingOutput(path.to_path_buf()))
    }
}

/// Remove `dir` with all its content and recreate it empty.
pub async fn reset_dir(dir: impl AsRef<Path>) -> MediaResult<()> {
    let dir = dir.as_ref();
    match fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(MediaError::from(e)),
    }
    fs::create_dir_all(dir).await?;
    Ok(())
}

/// Remove a file if it exists.
pub async fn remove_if_exists(path: impl AsRef<Path>) -> MediaResult<bool> {
    match fs::remove_file(path.as_ref()).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Regular files directly inside `dir`, sorted by path.
///
/// A missing directory lists as empty.
pub async fn list_files(dir: impl AsRef<Path>) -> MediaResult<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir.as_ref()).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(MediaError::from(e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

//! Upload, listing and download of workflow files.

use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::{Multipart, Path as UrlPath, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use vdub_media::fs_utils::list_files;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Multipart field carrying the video.
const UPLOAD_FIELD: &str = "video";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Serialize)]
pub struct FilesResponse {
    pub input: Vec<String>,
    pub output: Vec<String>,
    pub dubbed: Vec<String>,
}

/// Reduce a client-supplied name to a bare file name that cannot escape
/// its directory. Returns `None` if nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    // Browsers on Windows may send the full client path
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        None
    } else {
        Some(cleaned)
    }
}

/// Whether `name` is a plain file name with no path components.
fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && Path::new(name).file_name().is_some_and(|f| f == name)
}

/// `POST /upload`
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let input_dir = state.orchestrator.layout().input_dir.clone();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .and_then(sanitize_filename)
            .ok_or_else(|| ApiError::bad_request("Missing or invalid filename"))?;

        tokio::fs::create_dir_all(&input_dir).await?;
        let path = input_dir.join(&filename);
        let mut file = tokio::fs::File::create(&path).await?;

        let mut size: u64 = 0;
        loop {
            let chunk = match field.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&path).await;
                    warn!("Upload of {} aborted: {}", filename, e);
                    return Err(ApiError::bad_request(format!("Upload interrupted: {}", e)));
                }
            };
            size += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        metrics::record_upload_bytes(size);
        info!(filename = %filename, size, "Video uploaded");

        return Ok(Json(UploadResponse {
            success: true,
            filename,
            path: path.display().to_string(),
            size,
        }));
    }

    Err(ApiError::bad_request("No video field"))
}

/// `GET /files`
pub async fn get_files(State(state): State<AppState>) -> ApiResult<Json<FilesResponse>> {
    let layout = state.orchestrator.layout();

    let as_strings = |paths: Vec<PathBuf>| -> Vec<String> {
        paths.into_iter().map(|p| p.display().to_string()).collect()
    };

    Ok(Json(FilesResponse {
        input: as_strings(list_files(&layout.input_dir).await?),
        output: as_strings(list_files(&layout.output_dir).await?),
        dubbed: as_strings(list_files(&layout.dubbed_dir).await?),
    }))
}

/// `GET /download/:filename`
///
/// Looks in the output directory first, then the dubbed directory.
pub async fn download_file(
    State(state): State<AppState>,
    UrlPath(filename): UrlPath<String>,
) -> ApiResult<Response> {
    if !is_plain_filename(&filename) {
        warn!(filename = %filename, "Rejected download path");
        return Err(ApiError::bad_request("Invalid filename"));
    }

    let layout = state.orchestrator.layout();
    let mut found = None;
    for dir in [&layout.output_dir, &layout.dubbed_dir] {
        let candidate = dir.join(&filename);
        if tokio::fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
            found = Some(candidate);
            break;
        }
    }
    let path = found.ok_or_else(|| ApiError::not_found("File not found"))?;

    let file = tokio::fs::File::open(&path).await?;
    let length = file.metadata().await?.len();
    let body = Body::from_stream(ReaderStream::new(file));

    Ok((
        [
            (header::CONTENT_TYPE, content_type(&path).to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") => "video/mp4",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("wav") => "audio/wav",
        Some("ogg") | Some("opus") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("my video.mp4").as_deref(), Some("my_video.mp4"));
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename(r"C:\Users\me\clip.mov").as_deref(), Some("clip.mov"));
        assert_eq!(sanitize_filename(".hidden.mp4").as_deref(), Some("hidden.mp4"));
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename(""), None);
    }

    #[test]
    fn test_plain_filename() {
        assert!(is_plain_filename("final_video_hungarian.mp4"));
        assert!(!is_plain_filename("../secret"));
        assert!(!is_plain_filename("a/b.mp4"));
        assert!(!is_plain_filename(".."));
        assert!(!is_plain_filename(""));
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(Path::new("x.MP4")), "video/mp4");
        assert_eq!(content_type(Path::new("dubbed_audio.mp3")), "audio/mpeg");
        assert_eq!(content_type(Path::new("blob")), "application/octet-stream");
    }
}

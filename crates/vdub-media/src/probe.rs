//! FFprobe duration lookup.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Probe the container duration of a media file in seconds.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        });
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

/// Extract the duration from FFprobe JSON output.
///
/// Empty output, `N/A`, non-numeric and non-finite values are all
/// [`MediaError::DurationUnavailable`].
pub fn parse_duration(stdout: &str) -> MediaResult<f64> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(MediaError::duration_unavailable("ffprobe returned no output"));
    }

    let probe: FfprobeOutput = serde_json::from_str(trimmed)
        .map_err(|e| MediaError::duration_unavailable(format!("unreadable ffprobe output: {}", e)))?;

    let raw = probe
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| MediaError::duration_unavailable("no duration in ffprobe output"))?;

    match raw.trim().parse::<f64>() {
        Ok(duration) if duration.is_finite() && duration > 0.0 => Ok(duration),
        _ => Err(MediaError::duration_unavailable(format!(
            "invalid duration value '{}'",
            raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        let out = r#"{"format": {"duration": "125.480000"}}"#;
        assert!((parse_duration(out).unwrap() - 125.48).abs() < 1e-9);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        for out in [
            "",
            "   \n",
            "not json",
            r#"{"format": {}}"#,
            r#"{"format": {"duration": "N/A"}}"#,
            r#"{"format": {"duration": "inf"}}"#,
            r#"{"format": {"duration": "0"}}"#,
            r#"{}"#,
        ] {
            assert!(
                matches!(parse_duration(out), Err(MediaError::DurationUnavailable(_))),
                "accepted {:?}",
                out
            );
        }
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let err = probe_duration("/definitely/not/here.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}

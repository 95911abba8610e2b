//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use vdub_media::{AudioSettings, RetryPolicy, WorkspaceLayout};

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Length of each cut segment in seconds
    pub chunk_duration_secs: f64,
    /// Total attempts per collaborator call
    pub max_retries: u32,
    /// Fixed pause between attempts
    pub retry_delay: Duration,
    /// Run the agent's browser without a window
    pub browser_headless: bool,
    /// Timeout for one agent call
    pub browser_timeout: Duration,
    /// Language the segments are dubbed into
    pub target_language: String,
    /// Uploaded sources
    pub input_dir: PathBuf,
    /// Non-dubbed intermediates
    pub output_dir: PathBuf,
    /// Scratch area (chunks, concat list)
    pub temp_dir: PathBuf,
    /// Dubbed artifacts
    pub dubbed_dir: PathBuf,
    /// Encoder for the extracted audio track
    pub audio_codec: String,
    /// Bitrate for the extracted audio track
    pub audio_bitrate: String,
    /// Timeout for a single ffmpeg call
    pub ffmpeg_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            chunk_duration_secs: 60.0,
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            browser_headless: true,
            browser_timeout: Duration::from_secs(600),
            target_language: "Hungarian".to_string(),
            input_dir: PathBuf::from("./input"),
            output_dir: PathBuf::from("./output"),
            temp_dir: PathBuf::from("./temp"),
            dubbed_dir: PathBuf::from("./dubbed"),
            audio_codec: "libmp3lame".to_string(),
            audio_bitrate: "192k".to_string(),
            ffmpeg_timeout: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            chunk_duration_secs: env_parse("CHUNK_DURATION_SECONDS").unwrap_or(defaults.chunk_duration_secs),
            max_retries: env_parse("MAX_RETRIES").unwrap_or(defaults.max_retries),
            retry_delay: env_parse("RETRY_DELAY")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_delay),
            browser_headless: env_bool("BROWSER_HEADLESS").unwrap_or(defaults.browser_headless),
            browser_timeout: env_parse("BROWSER_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.browser_timeout),
            target_language: std::env::var("TARGET_LANGUAGE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.target_language),
            input_dir: std::env::var("INPUT_DIR").map(PathBuf::from).unwrap_or(defaults.input_dir),
            output_dir: std::env::var("OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            temp_dir: std::env::var("TEMP_DIR").map(PathBuf::from).unwrap_or(defaults.temp_dir),
            dubbed_dir: std::env::var("DUBBED_DIR").map(PathBuf::from).unwrap_or(defaults.dubbed_dir),
            audio_codec: std::env::var("AUDIO_CODEC").unwrap_or(defaults.audio_codec),
            audio_bitrate: std::env::var("AUDIO_BITRATE").unwrap_or(defaults.audio_bitrate),
            ffmpeg_timeout: env_parse("FFMPEG_TIMEOUT").map(Duration::from_secs),
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        if !self.chunk_duration_secs.is_finite() || self.chunk_duration_secs <= 0.0 {
            return Err(WorkerError::config_error(format!(
                "CHUNK_DURATION_SECONDS must be positive, got {}",
                self.chunk_duration_secs
            )));
        }
        if self.max_retries == 0 {
            return Err(WorkerError::config_error("MAX_RETRIES must be at least 1"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay)
    }

    pub fn layout(&self) -> WorkspaceLayout {
        WorkspaceLayout::new(
            self.input_dir.clone(),
            self.output_dir.clone(),
            self.temp_dir.clone(),
            self.dubbed_dir.clone(),
        )
    }

    pub fn audio_settings(&self) -> AudioSettings {
        AudioSettings::new(self.audio_codec.clone(), self.audio_bitrate.clone())
    }
}

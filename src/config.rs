//! Application settings
//!
//! Settings are read from a JSON file in the user's config directory. Every
//! field has a default, so a missing file (or a partial one) is fine. A few
//! values can be overridden from the environment.

use crate::recorder::{BackpressurePolicy, RecorderOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_METRICS_URL: &str = "http://localhost:5000/system-info";

const ENV_METRICS_URL: &str = "LIVESTREAM_METRICS_URL";
const ENV_POLL_INTERVAL_MS: &str = "LIVESTREAM_POLL_INTERVAL_MS";
const ENV_FFMPEG_PATH: &str = "LIVESTREAM_FFMPEG_PATH";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub metrics: MetricsSettings,
    pub recorder: RecorderSettings,
    pub capture: CaptureSettings,
}

/// Metrics endpoint polling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MetricsSettings {
    pub url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
}

/// Recorder output and chunk channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RecorderSettings {
    pub mime_type: String,
    pub video_bits_per_second: u32,
    pub chunk_capacity: usize,
    pub backpressure: BackpressurePolicy,
    pub read_chunk_bytes: usize,
    /// How long FFmpeg must stay up without output before a start counts
    pub startup_grace_ms: u64,
}

/// Capture device selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureSettings {
    pub ffmpeg_path: String,
    pub video_device: Option<String>,
    pub audio_device: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            metrics: MetricsSettings::default(),
            recorder: RecorderSettings::default(),
            capture: CaptureSettings::default(),
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_METRICS_URL.to_string(),
            poll_interval_ms: 1000,
            request_timeout_ms: 2000,
        }
    }
}

impl Default for RecorderSettings {
    fn default() -> Self {
        let options = RecorderOptions::default();
        Self {
            mime_type: options.mime_type,
            video_bits_per_second: options.video_bits_per_second,
            chunk_capacity: 64,
            backpressure: BackpressurePolicy::default(),
            read_chunk_bytes: 64 * 1024,
            startup_grace_ms: 1500,
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            video_device: None,
            audio_device: None,
        }
    }
}

impl MetricsSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl RecorderSettings {
    pub fn recorder_options(&self) -> RecorderOptions {
        RecorderOptions {
            mime_type: self.mime_type.clone(),
            video_bits_per_second: self.video_bits_per_second,
        }
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }
}

impl AppSettings {
    /// Check values that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        reqwest::Url::parse(&self.metrics.url).map_err(|e| ConfigError::Invalid {
            field: "metrics.url",
            reason: e.to_string(),
        })?;

        let non_zero = [
            ("metrics.poll_interval_ms", self.metrics.poll_interval_ms),
            ("metrics.request_timeout_ms", self.metrics.request_timeout_ms),
            (
                "recorder.video_bits_per_second",
                u64::from(self.recorder.video_bits_per_second),
            ),
            ("recorder.chunk_capacity", self.recorder.chunk_capacity as u64),
            ("recorder.read_chunk_bytes", self.recorder.read_chunk_bytes as u64),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        self.recorder
            .recorder_options()
            .format()
            .map_err(|e| ConfigError::Invalid {
                field: "recorder.mime_type",
                reason: e.to_string(),
            })?;

        Ok(())
    }

    /// Apply overrides from an environment lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = non_empty(ENV_METRICS_URL) {
            self.metrics.url = url.trim().to_string();
        }
        if let Some(interval) = non_empty(ENV_POLL_INTERVAL_MS) {
            self.metrics.poll_interval_ms =
                interval.trim().parse().map_err(|_| ConfigError::Invalid {
                    field: "metrics.poll_interval_ms",
                    reason: format!("not a number: {interval}"),
                })?;
        }
        if let Some(path) = non_empty(ENV_FFMPEG_PATH) {
            self.capture.ffmpeg_path = path.trim().to_string();
        }
        Ok(())
    }
}

pub fn default_settings_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("livestream-monitor").join("settings.json")
}

/// Read settings from `path`, falling back to defaults when the file is absent
pub fn load(path: &Path) -> Result<AppSettings, ConfigError> {
    let mut settings = match fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str::<AppSettings>(&contents)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No settings at {:?}, using defaults", path);
            AppSettings::default()
        }
        Err(e) => return Err(e.into()),
    };

    settings.apply_overrides(|key| std::env::var(key).ok())?;
    settings.validate()?;
    Ok(settings)
}

/// Like [`load`], but writes a default settings file on first run
pub fn load_or_init(path: &Path) -> Result<AppSettings, ConfigError> {
    if !path.exists() {
        match save(path, &AppSettings::default()) {
            Ok(()) => tracing::info!("Wrote default settings to {:?}", path),
            Err(e) => tracing::warn!("Could not write default settings to {:?}: {}", path, e),
        }
    }
    load(path)
}

pub fn save(path: &Path, settings: &AppSettings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(settings)?;
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_page_constants() {
        let settings = AppSettings::default();
        assert_eq!(settings.metrics.url, "http://localhost:5000/system-info");
        assert_eq!(settings.metrics.poll_interval(), Duration::from_secs(1));
        assert_eq!(settings.recorder.mime_type, "video/webm; codecs=vp9");
        assert_eq!(settings.recorder.video_bits_per_second, 2_500_000);
        assert_eq!(settings.recorder.backpressure, BackpressurePolicy::Wait);
        assert_eq!(settings.recorder.startup_grace(), Duration::from_millis(1500));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "metrics": { "poll_interval_ms": 250 } }"#).expect("write");

        let settings = load(&path).expect("partial settings should load");
        assert_eq!(settings.metrics.poll_interval_ms, 250);
        assert_eq!(settings.metrics.request_timeout_ms, 2000);
        assert_eq!(settings.recorder, RecorderSettings::default());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let settings = load(&dir.path().join("absent.json")).expect("defaults");
        assert_eq!(settings.capture, CaptureSettings::default());
    }

    #[test]
    fn first_run_writes_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("livestream-monitor").join("settings.json");

        load_or_init(&path).expect("defaults");
        let written: AppSettings =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("parse");
        assert_eq!(written, AppSettings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").expect("write");
        assert!(matches!(load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = AppSettings::default();
        settings.capture.video_device = Some("/dev/video2".to_string());
        settings.recorder.backpressure = BackpressurePolicy::DropNewest;

        save(&path, &settings).expect("save");
        let mut loaded: AppSettings =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("parse");
        loaded.apply_overrides(|_| None).expect("no overrides");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn environment_overrides_win() {
        let mut settings = AppSettings::default();
        settings
            .apply_overrides(|key| match key {
                "LIVESTREAM_METRICS_URL" => Some("http://10.0.0.2:9000/stats".to_string()),
                "LIVESTREAM_POLL_INTERVAL_MS" => Some("500".to_string()),
                "LIVESTREAM_FFMPEG_PATH" => Some("  ".to_string()),
                _ => None,
            })
            .expect("overrides should apply");

        assert_eq!(settings.metrics.url, "http://10.0.0.2:9000/stats");
        assert_eq!(settings.metrics.poll_interval_ms, 500);
        assert_eq!(settings.capture.ffmpeg_path, "ffmpeg");
    }

    #[test]
    fn rejects_zero_interval_and_bad_url() {
        let mut settings = AppSettings::default();
        settings.metrics.poll_interval_ms = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field: "metrics.poll_interval_ms", .. })
        ));

        let mut settings = AppSettings::default();
        settings.metrics.url = "not a url".to_string();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field: "metrics.url", .. })
        ));
    }

    #[test]
    fn rejects_unknown_mime_type() {
        let mut settings = AppSettings::default();
        settings.recorder.mime_type = "audio/flac".to_string();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { field: "recorder.mime_type", .. })
        ));
    }
}

//! Capture trait definitions
//!
//! Platform-agnostic traits for camera/microphone capture.

use crate::recorder::{MediaRecorder, RecorderOptions, RecordingError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Capture backend error: {0}")]
    Backend(String),

    #[error("A stream is already active")]
    AlreadyActive,

    #[error("Recorder error: {0}")]
    Recorder(#[source] RecordingError),
}

/// Device problems found by the recorder are capture errors in their own right
impl From<RecordingError> for CaptureError {
    fn from(error: RecordingError) -> Self {
        match error {
            RecordingError::InputPermissionDenied(detail) => CaptureError::PermissionDenied(detail),
            RecordingError::InputUnavailable(detail) => CaptureError::DeviceNotFound(detail),
            other => CaptureError::Recorder(other),
        }
    }
}

impl CaptureError {
    /// Whether the host refused access or has no usable device
    pub fn is_permission_or_device(&self) -> bool {
        matches!(
            self,
            CaptureError::PermissionDenied(_) | CaptureError::DeviceNotFound(_)
        )
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Which inputs to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl MediaConstraints {
    /// Combined camera + microphone
    pub fn audio_video() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// A single hardware-backed track of a media stream
pub trait MediaTrack: Send + Sync {
    fn kind(&self) -> TrackKind;

    /// Device label
    fn label(&self) -> &str;

    /// Release the underlying device. Stopping twice is harmless.
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// Live camera/microphone feed
pub trait MediaStream: Send + Sync {
    /// Unique stream id
    fn id(&self) -> &str;

    fn tracks(&self) -> Vec<&dyn MediaTrack>;

    /// Stop every track, releasing the hardware
    fn stop_all_tracks(&self) {
        for track in self.tracks() {
            track.stop();
        }
    }

    fn is_active(&self) -> bool {
        self.tracks().iter().any(|track| track.is_live())
    }

    /// File the backend keeps refreshed with the latest JPEG frame, if any
    fn preview_frame_path(&self) -> Option<&Path> {
        None
    }
}

/// Host capture capability: hands out streams and recorders for them
#[async_trait]
pub trait CaptureHost: Send + Sync {
    /// Ask for access to the requested devices
    async fn request_media(&self, constraints: MediaConstraints)
        -> CaptureResult<Box<dyn MediaStream>>;

    /// Build a recorder for a stream obtained from this host
    fn create_recorder(
        &self,
        stream: &dyn MediaStream,
        options: &RecorderOptions,
    ) -> CaptureResult<Box<dyn MediaRecorder>>;
}

/// Where the live feed is shown
pub trait PreviewSink: Send + Sync {
    fn attach(&self, stream: &dyn MediaStream);

    fn detach(&self);
}

/// Preview that only logs; used when no view is available
#[derive(Debug, Default)]
pub struct LogPreview;

impl PreviewSink for LogPreview {
    fn attach(&self, stream: &dyn MediaStream) {
        let labels: Vec<&str> = stream.tracks().iter().map(|t| t.label()).collect();
        tracing::info!("Preview bound to stream {} ({:?})", stream.id(), labels);
    }

    fn detach(&self) {
        tracing::info!("Preview cleared");
    }
}

/// Information about an audio device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Whether this is the default device
    pub is_default: bool,
}

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,
}

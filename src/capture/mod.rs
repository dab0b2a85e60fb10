//! Camera/microphone capture
//!
//! This module provides the capture host abstraction and its FFmpeg-backed
//! implementation, plus the frame preview.

pub mod devices;
pub mod ffmpeg;
pub mod preview;
pub mod traits;

pub use ffmpeg::{FfmpegHost, FfmpegStream};
pub use preview::{FramePreview, FrameSink};
pub use traits::{
    AudioDeviceInfo, CameraInfo, CaptureError, CaptureHost, CaptureResult, LogPreview,
    MediaConstraints, MediaStream, MediaTrack, PreviewSink, TrackKind,
};

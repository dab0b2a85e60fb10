//! FFmpeg-backed capture host
//!
//! FFmpeg opens the camera and microphone itself (v4l2/ALSA on Linux,
//! AVFoundation on macOS, DirectShow on Windows). The host checks that
//! FFmpeg and the devices are usable before handing out a stream, so a
//! missing or locked device surfaces as a capture error rather than a
//! recorder failure.

use super::devices;
use super::traits::{
    CaptureError, CaptureHost, CaptureResult, MediaConstraints, MediaStream, MediaTrack,
    TrackKind,
};
use crate::config::{CaptureSettings, RecorderSettings};
use crate::recorder::ffmpeg::DEFAULT_SHUTDOWN_TIMEOUT;
use crate::recorder::{FfmpegRecorder, MediaRecorder, RecorderOptions};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Track backed by a device spec FFmpeg understands
#[derive(Debug)]
pub struct FfmpegTrack {
    kind: TrackKind,
    label: String,
    live: AtomicBool,
}

impl FfmpegTrack {
    fn new(kind: TrackKind, label: String) -> Self {
        Self {
            kind,
            label,
            live: AtomicBool::new(true),
        }
    }
}

impl MediaTrack for FfmpegTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            tracing::debug!("Released {:?} device {}", self.kind, self.label);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Camera/microphone pair opened through FFmpeg
#[derive(Debug)]
pub struct FfmpegStream {
    id: String,
    tracks: Vec<FfmpegTrack>,
    preview_frame: Option<PathBuf>,
}

impl FfmpegStream {
    pub fn new(video_device: Option<String>, audio_device: Option<String>) -> Self {
        let id = Uuid::new_v4().to_string();
        let preview_frame = video_device
            .as_ref()
            .map(|_| preview_dir().join(format!("preview-{id}.jpg")));

        let mut tracks = Vec::new();
        if let Some(device) = video_device {
            tracks.push(FfmpegTrack::new(TrackKind::Video, device));
        }
        if let Some(device) = audio_device {
            tracks.push(FfmpegTrack::new(TrackKind::Audio, device));
        }
        Self {
            id,
            tracks,
            preview_frame,
        }
    }
}

impl Drop for FfmpegStream {
    fn drop(&mut self) {
        if let Some(path) = &self.preview_frame {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!("Removed preview frame {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove preview frame {:?}: {}", path, e),
            }
        }
    }
}

fn preview_dir() -> PathBuf {
    std::env::temp_dir().join("livestream-monitor")
}

impl MediaStream for FfmpegStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> Vec<&dyn MediaTrack> {
        self.tracks.iter().map(|t| t as &dyn MediaTrack).collect()
    }

    fn preview_frame_path(&self) -> Option<&Path> {
        self.preview_frame.as_deref()
    }
}

/// Capture host that records through an FFmpeg child process
pub struct FfmpegHost {
    capture: CaptureSettings,
    recorder: RecorderSettings,
}

impl FfmpegHost {
    pub fn new(capture: CaptureSettings, recorder: RecorderSettings) -> Self {
        Self { capture, recorder }
    }

    async fn check_ffmpeg(&self) -> CaptureResult<()> {
        let output = tokio::process::Command::new(&self.capture.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| {
                CaptureError::Backend(format!(
                    "FFmpeg not found at '{}': {}",
                    self.capture.ffmpeg_path, e
                ))
            })?;

        if !output.status.success() {
            return Err(CaptureError::Backend(format!(
                "FFmpeg exited with {}",
                output.status
            )));
        }
        Ok(())
    }

    fn resolve_video_device(&self) -> CaptureResult<String> {
        if devices::enumeration_available() {
            let cameras = devices::get_cameras();
            if cameras.is_empty() {
                return Err(CaptureError::DeviceNotFound("No cameras found".to_string()));
            }
            if self.capture.video_device.is_none() && cfg!(target_os = "windows") {
                return Ok(cameras[0].name.clone());
            }
        }

        let device = self
            .capture
            .video_device
            .clone()
            .or_else(|| default_video_device().map(str::to_string))
            .ok_or_else(|| {
                CaptureError::DeviceNotFound("No camera configured (capture.video_device)".to_string())
            })?;

        check_device_node(&device)?;
        Ok(device)
    }

    fn resolve_audio_device(&self) -> CaptureResult<String> {
        if devices::enumeration_available() {
            let microphones = devices::get_audio_input_devices();
            if microphones.is_empty() {
                return Err(CaptureError::DeviceNotFound("No microphones found".to_string()));
            }
            if self.capture.audio_device.is_none() && cfg!(target_os = "windows") {
                let default = microphones
                    .iter()
                    .find(|m| m.is_default)
                    .unwrap_or(&microphones[0]);
                return Ok(default.name.clone());
            }
        }

        self.capture
            .audio_device
            .clone()
            .or_else(|| default_audio_device().map(str::to_string))
            .ok_or_else(|| {
                CaptureError::DeviceNotFound(
                    "No microphone configured (capture.audio_device)".to_string(),
                )
            })
    }
}

#[async_trait]
impl CaptureHost for FfmpegHost {
    async fn request_media(
        &self,
        constraints: MediaConstraints,
    ) -> CaptureResult<Box<dyn MediaStream>> {
        if !constraints.audio && !constraints.video {
            return Err(CaptureError::Backend("No inputs requested".to_string()));
        }

        self.check_ffmpeg().await?;

        let video = if constraints.video {
            Some(self.resolve_video_device()?)
        } else {
            None
        };
        let audio = if constraints.audio {
            Some(self.resolve_audio_device()?)
        } else {
            None
        };

        tracing::info!("Opened capture devices: video={:?}, audio={:?}", video, audio);
        Ok(Box::new(FfmpegStream::new(video, audio)))
    }

    fn create_recorder(
        &self,
        stream: &dyn MediaStream,
        options: &RecorderOptions,
    ) -> CaptureResult<Box<dyn MediaRecorder>> {
        let label = |kind: TrackKind| {
            stream
                .tracks()
                .into_iter()
                .find(|t| t.kind() == kind && t.is_live())
                .map(|t| t.label().to_string())
        };
        let video = label(TrackKind::Video);
        let audio = label(TrackKind::Audio);

        let inputs = input_args(std::env::consts::OS, video.as_deref(), audio.as_deref())?;
        let mut recorder = FfmpegRecorder::new(
            self.capture.ffmpeg_path.clone(),
            inputs,
            options.clone(),
            video.is_some(),
            audio.is_some(),
            self.recorder.read_chunk_bytes,
        )?
        .with_timeouts(self.recorder.startup_grace(), DEFAULT_SHUTDOWN_TIMEOUT);

        if let Some(path) = stream.preview_frame_path() {
            match path.parent().map(std::fs::create_dir_all).transpose() {
                Ok(_) => recorder = recorder.with_preview_output(path.to_path_buf()),
                Err(e) => tracing::warn!("Preview frames disabled: {}", e),
            }
        }
        Ok(Box::new(recorder))
    }
}

fn default_video_device() -> Option<&'static str> {
    match std::env::consts::OS {
        "linux" => Some("/dev/video0"),
        "macos" => Some("0"),
        _ => None,
    }
}

fn default_audio_device() -> Option<&'static str> {
    match std::env::consts::OS {
        "linux" => Some("default"),
        "macos" => Some("0"),
        _ => None,
    }
}

/// On Linux the camera is a device node we can open directly
fn check_device_node(device: &str) -> CaptureResult<()> {
    if !cfg!(target_os = "linux") || !device.starts_with("/dev/") {
        return Ok(());
    }

    match std::fs::File::open(device) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CaptureError::DeviceNotFound(device.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(CaptureError::PermissionDenied(device.to_string()))
        }
        Err(e) => Err(CaptureError::Backend(format!("{}: {}", device, e))),
    }
}

/// FFmpeg input arguments for the given platform and devices
pub fn input_args(
    os: &str,
    video: Option<&str>,
    audio: Option<&str>,
) -> CaptureResult<Vec<String>> {
    if video.is_none() && audio.is_none() {
        return Err(CaptureError::Backend("Stream has no live tracks".to_string()));
    }

    let mut args: Vec<String> = Vec::new();
    match os {
        "linux" => {
            if let Some(video) = video {
                args.extend(["-thread_queue_size", "512", "-f", "v4l2", "-i", video].map(String::from));
            }
            if let Some(audio) = audio {
                args.extend(["-thread_queue_size", "512", "-f", "alsa", "-i", audio].map(String::from));
            }
        }
        "macos" => {
            let spec = format!("{}:{}", video.unwrap_or("none"), audio.unwrap_or("none"));
            args.extend(["-f".to_string(), "avfoundation".to_string(), "-i".to_string(), spec]);
        }
        "windows" => {
            let mut parts = Vec::new();
            if let Some(video) = video {
                parts.push(format!("video={video}"));
            }
            if let Some(audio) = audio {
                parts.push(format!("audio={audio}"));
            }
            args.extend(["-f".to_string(), "dshow".to_string(), "-i".to_string(), parts.join(":")]);
        }
        other => {
            return Err(CaptureError::Backend(format!(
                "Capture is not supported on {other}"
            )))
        }
    }
    Ok(args)
}

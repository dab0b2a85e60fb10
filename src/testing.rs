//! In-memory fakes for the capture host, recorder, preview and metrics source

use crate::capture::{
    CaptureError, CaptureHost, CaptureResult, MediaConstraints, MediaStream, MediaTrack,
    PreviewSink, TrackKind,
};
use crate::metrics::{MetricsError, SystemInfo, SystemInfoSource};
use crate::recorder::{ChunkSink, MediaRecorder, RecorderOptions, RecordingError, RecordingResult};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub struct FakeTrack {
    kind: TrackKind,
    live: AtomicBool,
}

impl MediaTrack for FakeTrack {
    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn label(&self) -> &str {
        match self.kind {
            TrackKind::Audio => "fake microphone",
            TrackKind::Video => "fake camera",
        }
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

pub struct FakeStream {
    id: String,
    tracks: Vec<Arc<FakeTrack>>,
    preview_frame: Option<PathBuf>,
}

impl FakeStream {
    fn track(kind: TrackKind) -> Arc<FakeTrack> {
        Arc::new(FakeTrack {
            kind,
            live: AtomicBool::new(true),
        })
    }

    /// Camera stream whose latest frame is kept at `path`
    pub fn with_preview_frame(path: PathBuf) -> Self {
        Self {
            id: "fake-video".to_string(),
            tracks: vec![Self::track(TrackKind::Video)],
            preview_frame: Some(path),
        }
    }

    pub fn audio_only() -> Self {
        Self {
            id: "fake-audio".to_string(),
            tracks: vec![Self::track(TrackKind::Audio)],
            preview_frame: None,
        }
    }
}

impl MediaStream for FakeStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> Vec<&dyn MediaTrack> {
        self.tracks.iter().map(|t| t.as_ref() as &dyn MediaTrack).collect()
    }

    fn preview_frame_path(&self) -> Option<&Path> {
        self.preview_frame.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeFailure {
    Permission,
    NoDevice,
    RecorderStart,
}

/// Recorder that emits scripted chunks: `chunks` on start, `tail` on stop
pub struct ScriptedRecorder {
    options: RecorderOptions,
    chunks: Vec<Bytes>,
    tail: Vec<Bytes>,
    fail_start: bool,
    sink: Option<ChunkSink>,
    stops: Arc<AtomicUsize>,
    died: Arc<AtomicBool>,
}

#[async_trait]
impl MediaRecorder for ScriptedRecorder {
    fn options(&self) -> &RecorderOptions {
        &self.options
    }

    async fn start(&mut self, sink: ChunkSink) -> RecordingResult<()> {
        if self.fail_start {
            return Err(RecordingError::Encoder("scripted start failure".to_string()));
        }
        for chunk in &self.chunks {
            sink.push(chunk.clone()).await?;
        }
        self.sink = Some(sink);
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        let sink = self.sink.take().ok_or(RecordingError::NotRecording)?;
        for chunk in &self.tail {
            sink.push(chunk.clone()).await?;
        }
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.sink.is_some() && !self.died.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeHost {
    pub failure: Option<FakeFailure>,
    pub chunks: Vec<Bytes>,
    pub tail: Vec<Bytes>,
    pub requests: AtomicUsize,
    pub recorder_stops: Arc<AtomicUsize>,
    pub issued_tracks: Mutex<Vec<Arc<FakeTrack>>>,
    pub last_options: Mutex<Option<RecorderOptions>>,
    pub recorder_died: Arc<AtomicBool>,
}

impl FakeHost {
    pub fn with_chunks(chunks: &[&'static [u8]], tail: &[&'static [u8]]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| Bytes::from_static(c)).collect(),
            tail: tail.iter().map(|c| Bytes::from_static(c)).collect(),
            ..Self::default()
        }
    }

    pub fn failing(failure: FakeFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    pub fn live_tracks(&self) -> usize {
        self.issued_tracks.lock().iter().filter(|t| t.is_live()).count()
    }

    /// Make every recorder from this host report that its encoder exited
    pub fn kill_recorder(&self) {
        self.recorder_died.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CaptureHost for FakeHost {
    async fn request_media(
        &self,
        constraints: MediaConstraints,
    ) -> CaptureResult<Box<dyn MediaStream>> {
        let n = self.requests.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Some(FakeFailure::Permission) => {
                return Err(CaptureError::PermissionDenied("camera".to_string()))
            }
            Some(FakeFailure::NoDevice) => {
                return Err(CaptureError::DeviceNotFound("camera".to_string()))
            }
            _ => {}
        }

        let mut tracks = Vec::new();
        if constraints.video {
            tracks.push(FakeStream::track(TrackKind::Video));
        }
        if constraints.audio {
            tracks.push(FakeStream::track(TrackKind::Audio));
        }
        self.issued_tracks.lock().extend(tracks.iter().cloned());

        Ok(Box::new(FakeStream {
            id: format!("fake-stream-{n}"),
            tracks,
            preview_frame: None,
        }))
    }

    fn create_recorder(
        &self,
        _stream: &dyn MediaStream,
        options: &RecorderOptions,
    ) -> CaptureResult<Box<dyn MediaRecorder>> {
        *self.last_options.lock() = Some(options.clone());
        Ok(Box::new(ScriptedRecorder {
            options: options.clone(),
            chunks: self.chunks.clone(),
            tail: self.tail.clone(),
            fail_start: self.failure == Some(FakeFailure::RecorderStart),
            sink: None,
            stops: self.recorder_stops.clone(),
            died: self.recorder_died.clone(),
        }))
    }
}

#[derive(Default)]
pub struct FakePreview {
    pub attached: Mutex<Option<String>>,
    pub attaches: AtomicUsize,
}

impl PreviewSink for FakePreview {
    fn attach(&self, stream: &dyn MediaStream) {
        self.attaches.fetch_add(1, Ordering::SeqCst);
        *self.attached.lock() = Some(stream.id().to_string());
    }

    fn detach(&self) {
        *self.attached.lock() = None;
    }
}

/// Metrics source replaying scripted results, then failing
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<SystemInfo, MetricsError>>>,
    pub calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<SystemInfo, MetricsError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SystemInfoSource for ScriptedSource {
    async fn fetch(&self) -> Result<SystemInfo, MetricsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(MetricsError::Transport("script exhausted".to_string())))
    }
}

/// The sample record: 1 GiB used, 1 GiB free, 2 GiB total, one interface
pub fn sample_info() -> SystemInfo {
    let mut network_info = BTreeMap::new();
    network_info.insert("eth0".to_string(), vec!["192.168.1.5".to_string()]);
    SystemInfo {
        cpu_usage: 12.0,
        used_memory: 1_073_741_824,
        free_memory: 1_073_741_824,
        total_memory: 2_147_483_648,
        network_info,
    }
}

/// Write an executable shell script standing in for the ffmpeg binary
#[cfg(unix)]
pub fn fake_ffmpeg(dir: &std::path::Path, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("ffmpeg");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

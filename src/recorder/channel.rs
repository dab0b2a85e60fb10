//! Recorder abstraction
//!
//! A `MediaRecorder` wraps a live media stream, encodes it and pushes the
//! encoded output as discrete segments into a `ChunkSink`. The sink is the
//! producer half of a bounded channel drained by the chunk assembler.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Recording-related errors
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Recorder is already running")]
    AlreadyRecording,

    #[error("Recorder is not running")]
    NotRecording,

    #[error("Unsupported MIME type: {0}")]
    UnsupportedMimeType(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Input device refused access: {0}")]
    InputPermissionDenied(String),

    #[error("Input device unavailable: {0}")]
    InputUnavailable(String),

    #[error("Chunk channel closed")]
    ChannelClosed,
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// Recorder configuration: output MIME type (with codec) and target bitrate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderOptions {
    pub mime_type: String,
    pub video_bits_per_second: u32,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            mime_type: "video/webm; codecs=vp9".to_string(),
            video_bits_per_second: 2_500_000,
        }
    }
}

impl RecorderOptions {
    /// Container MIME type without codec parameters
    pub fn container_mime(&self) -> String {
        self.mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    /// Resolve the encoder settings for this MIME type
    pub fn format(&self) -> RecordingResult<MediaFormat> {
        MediaFormat::parse(&self.mime_type)
    }
}

/// Encoder settings derived from a MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    WebmVp9,
    WebmVp8,
    Mp4H264,
}

impl MediaFormat {
    pub fn parse(mime_type: &str) -> RecordingResult<Self> {
        let mut parts = mime_type.split(';').map(|p| p.trim().to_ascii_lowercase());
        let container = parts.next().unwrap_or_default();
        let codecs = parts
            .find_map(|p| p.strip_prefix("codecs=").map(|c| c.trim_matches('"').to_string()))
            .unwrap_or_default();
        let video_codec = codecs.split(',').next().unwrap_or_default().trim().to_string();

        match (container.as_str(), video_codec.as_str()) {
            ("video/webm", "vp9") | ("video/webm", "vp09") => Ok(Self::WebmVp9),
            ("video/webm", "vp8") | ("video/webm", "") => Ok(Self::WebmVp8),
            ("video/mp4", c) if c.is_empty() || c.starts_with("avc1") || c == "h264" => {
                Ok(Self::Mp4H264)
            }
            _ => Err(RecordingError::UnsupportedMimeType(mime_type.to_string())),
        }
    }

    /// FFmpeg video encoder
    pub fn video_codec(&self) -> &'static str {
        match self {
            MediaFormat::WebmVp9 => "libvpx-vp9",
            MediaFormat::WebmVp8 => "libvpx",
            MediaFormat::Mp4H264 => "libx264",
        }
    }

    /// FFmpeg audio encoder
    pub fn audio_codec(&self) -> &'static str {
        match self {
            MediaFormat::WebmVp9 | MediaFormat::WebmVp8 => "libopus",
            MediaFormat::Mp4H264 => "aac",
        }
    }

    /// FFmpeg muxer plus any flags needed to write it to a pipe
    pub fn muxer_args(&self) -> &'static [&'static str] {
        match self {
            MediaFormat::WebmVp9 | MediaFormat::WebmVp8 => &["-f", "webm"],
            MediaFormat::Mp4H264 => &["-movflags", "frag_keyframe+empty_moov", "-f", "mp4"],
        }
    }
}

/// What a full chunk channel does to the producer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackpressurePolicy {
    /// Producer waits for capacity; nothing is lost
    #[default]
    Wait,
    /// Segment is discarded and counted
    DropNewest,
}

/// Producer half of the recorder → assembler channel
#[derive(Debug, Clone)]
pub struct ChunkSink {
    tx: mpsc::Sender<Bytes>,
    policy: BackpressurePolicy,
    dropped: Arc<AtomicU64>,
}

impl ChunkSink {
    /// Create a bounded channel with the given capacity
    pub fn channel(capacity: usize, policy: BackpressurePolicy) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sink = Self {
            tx,
            policy,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (sink, rx)
    }

    /// Push one encoded segment. Empty segments are ignored.
    ///
    /// Returns whether the segment was queued.
    pub async fn push(&self, data: Bytes) -> RecordingResult<bool> {
        if data.is_empty() {
            return Ok(false);
        }

        match self.policy {
            BackpressurePolicy::Wait => {
                self.tx
                    .send(data)
                    .await
                    .map_err(|_| RecordingError::ChannelClosed)?;
                Ok(true)
            }
            BackpressurePolicy::DropNewest => match self.tx.try_send(data) {
                Ok(()) => Ok(true),
                Err(mpsc::error::TrySendError::Full(data)) => {
                    let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        "Chunk channel full, dropped {} byte segment ({} dropped so far)",
                        data.len(),
                        dropped
                    );
                    Ok(false)
                }
                Err(mpsc::error::TrySendError::Closed(_)) => Err(RecordingError::ChannelClosed),
            },
        }
    }

    /// Number of segments discarded because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// An encoder attached to a live media stream
#[async_trait]
pub trait MediaRecorder: Send {
    /// Options the recorder was created with
    fn options(&self) -> &RecorderOptions;

    /// Begin encoding; segments go to `sink` until `stop` returns
    async fn start(&mut self, sink: ChunkSink) -> RecordingResult<()>;

    /// Flush remaining output and stop. No segments are pushed afterwards.
    async fn stop(&mut self) -> RecordingResult<()>;

    /// Check if the recorder is running
    fn is_recording(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_mime_type() {
        let options = RecorderOptions::default();
        assert_eq!(options.format().unwrap(), MediaFormat::WebmVp9);
        assert_eq!(options.container_mime(), "video/webm");
        assert_eq!(MediaFormat::WebmVp9.video_codec(), "libvpx-vp9");
    }

    #[test]
    fn parses_quoted_codec_lists() {
        assert_eq!(
            MediaFormat::parse("video/webm;codecs=\"vp8,opus\"").unwrap(),
            MediaFormat::WebmVp8
        );
        assert_eq!(
            MediaFormat::parse("video/mp4; codecs=avc1.42E01E").unwrap(),
            MediaFormat::Mp4H264
        );
        assert!(matches!(
            MediaFormat::parse("video/x-matroska"),
            Err(RecordingError::UnsupportedMimeType(_))
        ));
    }

    #[tokio::test]
    async fn empty_segments_are_never_queued() {
        let (sink, mut rx) = ChunkSink::channel(4, BackpressurePolicy::Wait);
        assert!(!sink.push(Bytes::new()).await.unwrap());
        assert!(sink.push(Bytes::from_static(b"abc")).await.unwrap());
        drop(sink);

        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"abc")));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn drop_newest_counts_overflow() {
        let (sink, mut rx) = ChunkSink::channel(1, BackpressurePolicy::DropNewest);
        assert!(sink.push(Bytes::from_static(b"1")).await.unwrap());
        assert!(!sink.push(Bytes::from_static(b"2")).await.unwrap());
        assert_eq!(sink.dropped(), 1);
        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"1")));
    }

    #[tokio::test]
    async fn push_after_receiver_dropped_fails() {
        let (sink, rx) = ChunkSink::channel(1, BackpressurePolicy::Wait);
        drop(rx);
        assert!(matches!(
            sink.push(Bytes::from_static(b"x")).await,
            Err(RecordingError::ChannelClosed)
        ));
    }
}

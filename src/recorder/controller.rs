//! Capture controller
//!
//! Owns the live media stream, its recorder and the chunk buffer for one
//! session. At most one stream is active at a time; start and stop are
//! mutually exclusive.

use super::assembler::{ChunkAssembler, ChunkBuffer, RecordedMedia};
use super::channel::{BackpressurePolicy, ChunkSink, MediaRecorder, RecorderOptions};
use super::state::{StreamEvent, StreamState, StreamStatus};
use crate::capture::{
    CaptureError, CaptureHost, CaptureResult, MediaConstraints, MediaStream, PreviewSink,
};
use crate::config::RecorderSettings;
use crate::network::{format_network_log, ConnectionInfoSource};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Stream, recorder and consumer task belonging to one recording
struct ActiveStream {
    stream: Box<dyn MediaStream>,
    recorder: Box<dyn MediaRecorder>,
    assembler: ChunkAssembler,
}

/// Drives camera/microphone capture and local recording
pub struct CaptureController {
    host: Arc<dyn CaptureHost>,
    preview: Arc<dyn PreviewSink>,
    connection: Arc<dyn ConnectionInfoSource>,
    options: RecorderOptions,
    chunk_capacity: usize,
    backpressure: BackpressurePolicy,
    active: Option<ActiveStream>,
    buffer: ChunkBuffer,
    network_log: String,
    event_tx: broadcast::Sender<StreamEvent>,
}

impl CaptureController {
    /// Create an idle controller
    pub fn new(
        host: Arc<dyn CaptureHost>,
        preview: Arc<dyn PreviewSink>,
        connection: Arc<dyn ConnectionInfoSource>,
        settings: &RecorderSettings,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            host,
            preview,
            connection,
            options: settings.recorder_options(),
            chunk_capacity: settings.chunk_capacity,
            backpressure: settings.backpressure,
            active: None,
            buffer: ChunkBuffer::new(),
            network_log: String::new(),
            event_tx,
        }
    }

    /// Subscribe to stream events
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.event_tx.subscribe()
    }

    pub fn state(&self) -> StreamState {
        if self.active.is_some() {
            StreamState::Streaming
        } else {
            StreamState::Idle
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.active.is_some()
    }

    /// Start control is enabled only while idle
    pub fn can_start(&self) -> bool {
        self.active.is_none()
    }

    /// Stop control is enabled only while streaming
    pub fn can_stop(&self) -> bool {
        self.active.is_some()
    }

    pub fn network_log(&self) -> &str {
        &self.network_log
    }

    pub fn recorder_options(&self) -> &RecorderOptions {
        &self.options
    }

    /// Number of chunks buffered for the current recording
    pub fn buffered_chunks(&self) -> usize {
        self.buffer.len()
    }

    pub fn status(&self) -> StreamStatus {
        StreamStatus {
            state: self.state(),
            stream_id: self.active.as_ref().map(|a| a.stream.id().to_string()),
            can_start: self.can_start(),
            can_stop: self.can_stop(),
            buffered_chunks: self.buffer.len(),
            buffered_bytes: self.buffer.byte_len(),
            network_log: self.network_log.clone(),
        }
    }

    /// Start streaming and recording.
    ///
    /// Failures are logged and leave the controller idle; nothing is
    /// reported back to the caller.
    pub async fn start_stream(&mut self) {
        let _ = self.start_stream_reported().await;
    }

    /// Start streaming, logging and announcing a failure before returning it
    pub async fn start_stream_reported(&mut self) -> CaptureResult<()> {
        let result = self.try_start_stream().await;
        if let Err(e) = &result {
            match e {
                CaptureError::AlreadyActive => {
                    tracing::debug!("Start ignored: a stream is already active");
                    return result;
                }
                e if e.is_permission_or_device() => {
                    tracing::error!("Error accessing camera/microphone: {}", e);
                }
                e => tracing::error!("Failed to start stream: {}", e),
            }
            let _ = self.event_tx.send(StreamEvent::StartFailed {
                message: e.to_string(),
            });
        }
        result
    }

    /// Start streaming, returning the reason when it did not happen
    pub async fn try_start_stream(&mut self) -> CaptureResult<()> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyActive);
        }

        let stream = self
            .host
            .request_media(MediaConstraints::audio_video())
            .await?;

        self.preview.attach(stream.as_ref());

        let started = start_recorder(
            self.host.as_ref(),
            stream.as_ref(),
            &self.options,
            self.chunk_capacity,
            self.backpressure,
            self.buffer.clone(),
        )
        .await;

        let active = match started {
            Ok((recorder, assembler)) => ActiveStream {
                stream,
                recorder,
                assembler,
            },
            Err(e) => {
                // Do not keep a half-started stream around
                stream.stop_all_tracks();
                self.preview.detach();
                self.buffer.clear();
                return Err(e);
            }
        };

        let stream_id = active.stream.id().to_string();
        self.active = Some(active);
        tracing::info!(
            "Stream {} started ({}, {} bit/s)",
            stream_id,
            self.options.mime_type,
            self.options.video_bits_per_second
        );
        let _ = self.event_tx.send(StreamEvent::Started { stream_id });

        self.log_network_info();
        Ok(())
    }

    /// Stop streaming and assemble the recording.
    ///
    /// Returns `None` when no stream is active. The assembled media is only
    /// logged here; callers decide whether to keep it.
    pub async fn stop_stream(&mut self) -> Option<RecordedMedia> {
        let ActiveStream {
            stream,
            mut recorder,
            assembler,
        } = self.active.take()?;

        if let Err(e) = recorder.stop().await {
            tracing::error!("Recorder did not stop cleanly: {}", e);
        }
        stream.stop_all_tracks();
        self.preview.detach();

        // Closes the chunk channel; the assembler finishes once drained
        drop(recorder);
        let media = assembler.finish(&self.options.container_mime()).await;
        self.buffer.clear();

        tracing::info!(
            "Recorded media {}: {} bytes in {} chunks ({})",
            media.id,
            media.size(),
            media.chunk_count,
            media.mime_type
        );
        let _ = self.event_tx.send(StreamEvent::Stopped {
            stream_id: stream.id().to_string(),
            bytes: media.size(),
            chunks: media.chunk_count,
        });

        Some(media)
    }

    /// Tear down a stream whose recorder ended on its own.
    ///
    /// Returns what was recorded up to that point; `None` while the recorder
    /// is still running or nothing is streaming.
    pub async fn reap_if_ended(&mut self) -> Option<RecordedMedia> {
        let ended = self
            .active
            .as_ref()
            .is_some_and(|active| !active.recorder.is_recording());
        if !ended {
            return None;
        }

        tracing::warn!("Recorder ended unexpectedly, releasing the stream");
        self.stop_stream().await
    }

    /// Snapshot the connection quality into the network log
    pub fn log_network_info(&mut self) -> &str {
        let info = self.connection.connection_info();
        self.network_log = format_network_log(info.as_ref());
        let _ = self.event_tx.send(StreamEvent::NetworkLog {
            text: self.network_log.clone(),
        });
        &self.network_log
    }
}

/// Create and start a recorder for `stream`, with its assembler running
async fn start_recorder(
    host: &dyn CaptureHost,
    stream: &dyn MediaStream,
    options: &RecorderOptions,
    chunk_capacity: usize,
    backpressure: BackpressurePolicy,
    buffer: ChunkBuffer,
) -> CaptureResult<(Box<dyn MediaRecorder>, ChunkAssembler)> {
    let mut recorder = host.create_recorder(stream, options)?;

    let (sink, rx) = ChunkSink::channel(chunk_capacity, backpressure);
    let assembler = ChunkAssembler::spawn(rx, buffer);

    if let Err(e) = recorder.start(sink).await {
        // Dropping the recorder closes the channel so the assembler ends
        drop(recorder);
        let _ = assembler.finish(&options.container_mime()).await;
        return Err(e.into());
    }
    Ok((recorder, assembler))
}

//! Frame preview
//!
//! Follows the JPEG still a capture backend keeps rewriting for its stream
//! and forwards each new complete frame to a [`FrameSink`].

use super::traits::{MediaStream, PreviewSink};
use bytes::Bytes;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const DEFAULT_FRAME_PERIOD: Duration = Duration::from_millis(200);

/// Receiver of preview frames; `None` clears the view
pub trait FrameSink: Send + Sync {
    fn frame(&self, jpeg: Option<Bytes>);
}

struct Follower {
    cancel: CancellationToken,
    // Dropping the handle detaches the task; it exits on cancel
    _handle: JoinHandle<()>,
}

/// Preview that pushes JPEG frames of the attached stream to a sink
pub struct FramePreview {
    sink: Arc<dyn FrameSink>,
    period: Duration,
    follower: Mutex<Option<Follower>>,
    // Held around every emission so nothing lands after a detach
    emit: Arc<Mutex<()>>,
}

impl FramePreview {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            sink,
            period: DEFAULT_FRAME_PERIOD,
            follower: Mutex::new(None),
            emit: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    fn stop_following(&self) {
        if let Some(follower) = self.follower.lock().take() {
            follower.cancel.cancel();
        }
    }
}

impl PreviewSink for FramePreview {
    fn attach(&self, stream: &dyn MediaStream) {
        self.stop_following();

        let Some(path) = stream.preview_frame_path().map(|p| p.to_path_buf()) else {
            tracing::info!("Stream {} has no video frames to preview", stream.id());
            return;
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!("Preview disabled, no async runtime: {}", e);
                return;
            }
        };

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(follow_frames(
            path,
            self.period,
            self.sink.clone(),
            self.emit.clone(),
            cancel.clone(),
        ));
        *self.follower.lock() = Some(Follower {
            cancel,
            _handle: handle,
        });
        tracing::info!("Preview bound to stream {}", stream.id());
    }

    fn detach(&self) {
        self.stop_following();
        let _emit = self.emit.lock();
        self.sink.frame(None);
        tracing::info!("Preview cleared");
    }
}

async fn follow_frames(
    path: PathBuf,
    period: Duration,
    sink: Arc<dyn FrameSink>,
    emit: Arc<Mutex<()>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last: Option<Bytes> = None;
    let mut sent = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let data = match tokio::fs::read(&path).await {
            Ok(data) => Bytes::from(data),
            // Not written yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                tracing::debug!("Could not read preview frame {:?}: {}", path, e);
                continue;
            }
        };
        if !is_complete_jpeg(&data) || last.as_ref() == Some(&data) {
            continue;
        }

        let _emit = emit.lock();
        if cancel.is_cancelled() {
            break;
        }
        sink.frame(Some(data.clone()));
        last = Some(data);
        sent += 1;
    }

    tracing::debug!("Preview follower stopped after {} frames", sent);
}

/// SOI at the start and EOI at the end; anything else is a partial write
fn is_complete_jpeg(data: &[u8]) -> bool {
    data.len() > 4 && data.starts_with(&[0xFF, 0xD8]) && data.ends_with(&[0xFF, 0xD9])
}

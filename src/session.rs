//! Live session
//!
//! A session owns everything the page used to keep in component state: the
//! capture controller and the metrics poller. It is built on mount and torn
//! down explicitly.

use crate::capture::{CaptureHost, CaptureResult, FfmpegHost, PreviewSink};
use crate::config::AppSettings;
use crate::metrics::{HttpSystemInfoSource, MetricsPoller, SystemInfoSource, SystemInfoView};
use crate::network::{ConnectionEstimator, ConnectionInfoSource};
use crate::recorder::{CaptureController, RecordedMedia, StreamEvent, StreamStatus};
use crate::utils::AppResult;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// How often the recorder is checked for having died under a live stream
const RECORDER_WATCH_PERIOD: Duration = Duration::from_millis(500);

/// Everything the front-end renders
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub stream: StreamStatus,
    pub system_info: Option<SystemInfoView>,
}

/// Capture controller plus metrics poller with a shared lifetime
pub struct LiveSession {
    controller: Arc<Mutex<CaptureController>>,
    poller: MetricsPoller,
    watch_cancel: CancellationToken,
    watch_handle: Option<JoinHandle<()>>,
}

impl LiveSession {
    /// Build the controller and start polling metrics.
    ///
    /// Settings are validated first; a zero period cannot drive a timer.
    pub fn mount(
        settings: &AppSettings,
        host: Arc<dyn CaptureHost>,
        preview: Arc<dyn PreviewSink>,
        connection: Arc<dyn ConnectionInfoSource>,
        metrics: Arc<dyn SystemInfoSource>,
    ) -> AppResult<Self> {
        settings.validate()?;

        let controller = Arc::new(Mutex::new(CaptureController::new(
            host,
            preview,
            connection,
            &settings.recorder,
        )));
        let poller = MetricsPoller::spawn(metrics, settings.metrics.poll_interval());
        let watch_cancel = CancellationToken::new();
        let watch_handle = spawn_recorder_watch(controller.clone(), watch_cancel.clone());

        tracing::info!("Session mounted");
        Ok(Self {
            controller,
            poller,
            watch_cancel,
            watch_handle: Some(watch_handle),
        })
    }

    /// Mount against FFmpeg capture and the HTTP metrics endpoint.
    ///
    /// Connection quality is estimated from the metrics requests themselves.
    pub fn mount_native(settings: &AppSettings, preview: Arc<dyn PreviewSink>) -> AppResult<Self> {
        let estimator = Arc::new(ConnectionEstimator::new());
        let metrics = HttpSystemInfoSource::new(
            settings.metrics.url.clone(),
            settings.metrics.request_timeout(),
        )?
        .with_estimator(estimator.clone());
        let host = FfmpegHost::new(settings.capture.clone(), settings.recorder.clone());

        tracing::debug!("Polling system info from {}", metrics.url());
        Self::mount(
            settings,
            Arc::new(host),
            preview,
            estimator,
            Arc::new(metrics),
        )
    }

    /// Shared handle to the capture controller
    pub fn controller(&self) -> Arc<Mutex<CaptureController>> {
        self.controller.clone()
    }

    /// Stream events from the controller
    pub async fn subscribe_events(&self) -> broadcast::Receiver<StreamEvent> {
        self.controller.lock().await.subscribe()
    }

    pub fn poller(&self) -> &MetricsPoller {
        &self.poller
    }

    /// Start streaming; the status is returned only when a new stream began
    pub async fn start_stream(&self) -> CaptureResult<StreamStatus> {
        let mut controller = self.controller.lock().await;
        controller.start_stream_reported().await?;
        Ok(controller.status())
    }

    pub async fn status(&self) -> StreamStatus {
        self.controller.lock().await.status()
    }

    /// Take a fresh connection reading into the network log
    pub async fn log_network_info(&self) -> String {
        self.controller.lock().await.log_network_info().to_string()
    }

    pub async fn stop_stream(&self) -> Option<RecordedMedia> {
        self.controller.lock().await.stop_stream().await
    }

    pub fn system_info(&self) -> Option<SystemInfoView> {
        self.poller
            .system_info()
            .as_ref()
            .map(SystemInfoView::from)
    }

    pub async fn view(&self) -> SessionView {
        SessionView {
            stream: self.status().await,
            system_info: self.system_info(),
        }
    }

    /// Release the devices if still streaming and stop polling
    pub async fn shutdown(&mut self) {
        self.watch_cancel.cancel();
        if let Some(handle) = self.watch_handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("Recorder watch task failed: {}", e);
            }
        }
        if let Some(media) = self.controller.lock().await.stop_stream().await {
            tracing::info!("Discarded {} byte recording on shutdown", media.size());
        }
        self.poller.shutdown().await;
        tracing::info!("Session shut down");
    }
}

/// Return the controller to idle when its recorder exits mid-stream
fn spawn_recorder_watch(
    controller: Arc<Mutex<CaptureController>>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RECORDER_WATCH_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Some(media) = controller.lock().await.reap_if_ended().await {
                tracing::info!(
                    "Kept {} bytes recorded before the recorder ended",
                    media.size()
                );
            }
        }
    })
}

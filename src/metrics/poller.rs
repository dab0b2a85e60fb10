//! Periodic metrics polling
//!
//! One fetch per period, awaited before the next tick, so responses can
//! never be applied out of order. Cancelling the poller also abandons a
//! fetch that is still in flight.

use super::client::SystemInfoSource;
use super::types::{PolledSystemInfo, SystemInfo};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Background task keeping the latest system info
pub struct MetricsPoller {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    latest: watch::Receiver<Option<PolledSystemInfo>>,
}

impl MetricsPoller {
    /// Start polling `source` every `period`. The first fetch happens one
    /// period from now.
    pub fn spawn(source: Arc<dyn SystemInfoSource>, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let (tx, latest) = watch::channel(None);

        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut sequence = 0u64;

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let result = tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    result = source.fetch() => result,
                };

                match result {
                    Ok(info) => {
                        sequence += 1;
                        tracing::trace!("System info #{} received", sequence);
                        tx.send_replace(Some(PolledSystemInfo {
                            info,
                            sequence,
                            fetched_at: Utc::now(),
                        }));
                    }
                    Err(e) => {
                        // Keep showing the last good reading
                        tracing::error!("Error fetching system info: {}", e);
                    }
                }
            }

            tracing::debug!("Metrics poller stopped after {} updates", sequence);
        });

        tracing::info!("Metrics poller started ({:?} period)", period);
        Self {
            cancel,
            handle: Some(handle),
            latest,
        }
    }

    /// Latest successful reading
    pub fn latest(&self) -> Option<PolledSystemInfo> {
        self.latest.borrow().clone()
    }

    /// Latest system info record
    pub fn system_info(&self) -> Option<SystemInfo> {
        self.latest.borrow().as_ref().map(|p| p.info.clone())
    }

    /// Receiver notified on every successful fetch
    pub fn subscribe(&self) -> watch::Receiver<Option<PolledSystemInfo>> {
        self.latest.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the timer and any in-flight fetch, then wait for the task
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::error!("Metrics poller task failed: {}", e);
            }
        }
    }
}

impl Drop for MetricsPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

//! Connection estimate from observed requests
//!
//! The metrics client reports the round-trip time and body size of each
//! successful fetch. Samples are smoothed and mapped onto the effective
//! connection types browsers use.

use super::{ConnectionInfo, ConnectionInfoSource};
use parking_lot::Mutex;
use std::time::Duration;

/// Weight of the newest sample
const SMOOTHING: f64 = 0.3;

/// Reported downlink never exceeds this (Mbit/s)
const MAX_DOWNLINK_MBPS: f64 = 10.0;

#[derive(Debug, Clone, Copy)]
struct Estimate {
    rtt_ms: f64,
    downlink_mbps: f64,
}

/// Running connection estimate
#[derive(Debug, Default)]
pub struct ConnectionEstimator {
    estimate: Mutex<Option<Estimate>>,
}

impl ConnectionEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request/response exchange
    pub fn record(&self, rtt: Duration, body_bytes: usize) {
        let rtt_ms = rtt.as_secs_f64() * 1000.0;
        let secs = rtt.as_secs_f64().max(1e-3);
        let downlink_mbps = (body_bytes as f64 * 8.0) / secs / 1_000_000.0;

        let mut estimate = self.estimate.lock();
        *estimate = Some(match *estimate {
            Some(prev) => Estimate {
                rtt_ms: prev.rtt_ms + SMOOTHING * (rtt_ms - prev.rtt_ms),
                downlink_mbps: prev.downlink_mbps
                    + SMOOTHING * (downlink_mbps - prev.downlink_mbps),
            },
            None => Estimate {
                rtt_ms,
                downlink_mbps,
            },
        });
    }

    /// Smoothed round-trip time
    pub fn rtt(&self) -> Option<Duration> {
        self.estimate
            .lock()
            .map(|e| Duration::from_secs_f64(e.rtt_ms / 1000.0))
    }
}

impl ConnectionInfoSource for ConnectionEstimator {
    fn connection_info(&self) -> Option<ConnectionInfo> {
        let estimate = (*self.estimate.lock())?;
        let downlink = round_downlink(estimate.downlink_mbps);
        Some(ConnectionInfo {
            effective_type: effective_type(estimate.rtt_ms, downlink).to_string(),
            downlink,
        })
    }
}

/// Nearest 25 kbit/s, capped
fn round_downlink(mbps: f64) -> f64 {
    ((mbps.min(MAX_DOWNLINK_MBPS) * 40.0).round() / 40.0).max(0.0)
}

/// Slowest class whose RTT or downlink threshold is hit
pub fn effective_type(rtt_ms: f64, downlink_mbps: f64) -> &'static str {
    if rtt_ms >= 2000.0 || downlink_mbps <= 0.05 {
        "slow-2g"
    } else if rtt_ms >= 1400.0 || downlink_mbps <= 0.07 {
        "2g"
    } else if rtt_ms >= 270.0 || downlink_mbps <= 0.7 {
        "3g"
    } else {
        "4g"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_until_first_sample() {
        let estimator = ConnectionEstimator::new();
        assert!(estimator.connection_info().is_none());
        assert!(estimator.rtt().is_none());
    }

    #[test]
    fn fast_exchange_is_4g_and_capped() {
        let estimator = ConnectionEstimator::new();
        estimator.record(Duration::from_millis(20), 1_000_000);
        let info = estimator.connection_info().unwrap();
        assert_eq!(info.effective_type, "4g");
        assert_eq!(info.downlink, 10.0);
    }

    #[test]
    fn slow_exchange_is_downgraded() {
        let estimator = ConnectionEstimator::new();
        estimator.record(Duration::from_millis(500), 25_000);
        let info = estimator.connection_info().unwrap();
        assert_eq!(info.downlink, 0.4);
        assert_eq!(info.effective_type, "3g");
    }

    #[test]
    fn samples_are_smoothed() {
        let estimator = ConnectionEstimator::new();
        estimator.record(Duration::from_millis(100), 0);
        estimator.record(Duration::from_millis(200), 0);
        let rtt = estimator.rtt().unwrap().as_secs_f64() * 1000.0;
        assert!((rtt - 130.0).abs() < 1e-6);
    }

    #[test]
    fn thresholds_follow_table() {
        assert_eq!(effective_type(2500.0, 5.0), "slow-2g");
        assert_eq!(effective_type(100.0, 0.05), "slow-2g");
        assert_eq!(effective_type(1500.0, 5.0), "2g");
        assert_eq!(effective_type(300.0, 5.0), "3g");
        assert_eq!(effective_type(100.0, 0.5), "3g");
        assert_eq!(effective_type(50.0, 2.0), "4g");
    }
}

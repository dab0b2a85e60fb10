//! Network-quality hints
//!
//! A connection-quality source is an optional capability: when it has
//! nothing to report, the log shows a fixed fallback message instead.

pub mod estimator;

pub use estimator::ConnectionEstimator;

use serde::{Deserialize, Serialize};

/// Shown when no connection information is available
pub const NOT_SUPPORTED_MESSAGE: &str = "Network Information API is not supported in this browser.";

/// Coarse connection quality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Label such as "4g" or "3g"
    pub effective_type: String,
    /// Estimated throughput in Mbit/s
    pub downlink: f64,
}

/// Host capability exposing connection quality
pub trait ConnectionInfoSource: Send + Sync {
    /// `None` when the capability is absent
    fn connection_info(&self) -> Option<ConnectionInfo>;
}

/// Source for hosts without the capability
#[derive(Debug, Default, Clone, Copy)]
pub struct NoConnectionInfo;

impl ConnectionInfoSource for NoConnectionInfo {
    fn connection_info(&self) -> Option<ConnectionInfo> {
        None
    }
}

/// Fixed reading, handy for hosts that report once
impl ConnectionInfoSource for ConnectionInfo {
    fn connection_info(&self) -> Option<ConnectionInfo> {
        Some(self.clone())
    }
}

/// Two-line network log, or the fallback message
pub fn format_network_log(info: Option<&ConnectionInfo>) -> String {
    match info {
        Some(info) => format!(
            "Effective Network Type: {}\nDownlink Speed: {} Mbps",
            info.effective_type, info.downlink
        ),
        None => NOT_SUPPORTED_MESSAGE.to_string(),
    }
}

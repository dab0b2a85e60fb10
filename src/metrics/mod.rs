//! Host metrics polling
//!
//! Periodically fetches CPU, memory and network-interface figures from the
//! metrics endpoint and keeps the latest successful reading for display.

pub mod client;
pub mod poller;
pub mod render;
pub mod types;

pub use client::{HttpSystemInfoSource, SystemInfoSource};
pub use poller::MetricsPoller;
pub use render::{bytes_to_mb, InterfaceView, SystemInfoView};
pub use types::{PolledSystemInfo, SystemInfo};

use thiserror::Error;

/// Metrics fetch errors
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Malformed system info: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for MetricsError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            MetricsError::Timeout
        } else if let Some(status) = error.status() {
            MetricsError::Status(status.as_u16())
        } else {
            MetricsError::Transport(error.to_string())
        }
    }
}

//! Metrics wire types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of `GET /system-info`
///
/// Every field is required; a payload without `networkInfo` is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub cpu_usage: f64,
    /// Bytes
    pub used_memory: u64,
    /// Bytes
    pub free_memory: u64,
    /// Bytes
    pub total_memory: u64,
    /// Interface name → addresses, sorted by interface name
    pub network_info: BTreeMap<String, Vec<String>>,
}

/// A successful reading as published by the poller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolledSystemInfo {
    pub info: SystemInfo,
    /// Increases by one per successful fetch
    pub sequence: u64,
    pub fetched_at: DateTime<Utc>,
}

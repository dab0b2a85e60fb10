//! Stream state management
//!
//! Defines the streaming state machine, the status snapshot handed to the
//! front-end, and the events broadcast by the controller.

use serde::{Deserialize, Serialize};

/// Current state of the capture controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    /// No stream; starting is allowed
    #[default]
    Idle,
    /// A stream and its recorder are live; stopping is allowed
    Streaming,
}

/// Snapshot of the controller for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    pub state: StreamState,
    pub stream_id: Option<String>,
    /// Start control enabled
    pub can_start: bool,
    /// Stop control enabled
    pub can_stop: bool,
    pub buffered_chunks: usize,
    pub buffered_bytes: usize,
    pub network_log: String,
}

/// Events emitted by the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamEvent {
    /// Stream acquired and recorder running
    #[serde(rename_all = "camelCase")]
    Started { stream_id: String },
    /// Recording finished and assembled
    #[serde(rename_all = "camelCase")]
    Stopped {
        stream_id: String,
        bytes: usize,
        chunks: usize,
    },
    /// Start attempt failed; the controller stayed idle
    StartFailed { message: String },
    /// Network log text changed
    NetworkLog { text: String },
}

//! Streaming commands

use crate::capture::devices::{get_audio_input_devices, get_cameras as enumerate_cameras};
use crate::capture::{AudioDeviceInfo, CameraInfo, CaptureError};
use crate::recorder::{RecordedMedia, StreamStatus};
use crate::session::LiveSession;
use crate::utils::{AppError, ErrorResponse};
use tauri::State;
use tokio::sync::RwLock;

/// Application state holding the live session
pub struct SessionState {
    pub session: RwLock<LiveSession>,
}

impl SessionState {
    pub fn new(session: LiveSession) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }
}

/// Start camera/microphone capture and recording
///
/// Starting while already streaming leaves the current stream alone.
#[tauri::command]
pub async fn start_stream(state: State<'_, SessionState>) -> Result<StreamStatus, ErrorResponse> {
    let session = state.session.read().await;
    match session.start_stream().await {
        Ok(status) => Ok(status),
        Err(CaptureError::AlreadyActive) => Ok(session.status().await),
        Err(e) => Err(AppError::from(e).into()),
    }
}

/// Stop the stream; returns the recording summary when one was active
#[tauri::command]
pub async fn stop_stream(state: State<'_, SessionState>) -> Result<Option<RecordedMedia>, String> {
    Ok(state.session.read().await.stop_stream().await)
}

#[tauri::command]
pub async fn get_stream_status(state: State<'_, SessionState>) -> Result<StreamStatus, String> {
    Ok(state.session.read().await.status().await)
}

/// Refresh the network log and return it
#[tauri::command]
pub async fn log_network_info(state: State<'_, SessionState>) -> Result<String, String> {
    Ok(state.session.read().await.log_network_info().await)
}

/// Get list of available cameras/webcams
#[tauri::command]
pub async fn get_cameras() -> Result<Vec<CameraInfo>, String> {
    Ok(enumerate_cameras())
}

/// Get list of available audio input devices (microphones)
#[tauri::command]
pub async fn get_audio_devices() -> Result<Vec<AudioDeviceInfo>, String> {
    Ok(get_audio_input_devices())
}

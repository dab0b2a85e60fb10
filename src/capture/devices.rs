//! Camera and microphone enumeration
//!
//! Uses nokhwa for cameras and cpal for microphones when built with the
//! `native-capture` feature. Without it, enumeration reports nothing and
//! device checks are left to FFmpeg.

use super::traits::{AudioDeviceInfo, CameraInfo};

/// Whether this build can enumerate devices
pub fn enumeration_available() -> bool {
    cfg!(feature = "native-capture")
}

/// Get list of available cameras
#[cfg(feature = "native-capture")]
pub fn get_cameras() -> Vec<CameraInfo> {
    use nokhwa::utils::{ApiBackend, CameraIndex};

    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                CameraInfo {
                    id,
                    name: info.human_name().to_string(),
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

#[cfg(not(feature = "native-capture"))]
pub fn get_cameras() -> Vec<CameraInfo> {
    Vec::new()
}

/// Get list of available audio input devices (microphones)
#[cfg(feature = "native-capture")]
pub fn get_audio_input_devices() -> Vec<AudioDeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|device| device.name().ok());

    match host.input_devices() {
        Ok(devices) => devices
            .filter_map(|device| device.name().ok())
            .map(|name| AudioDeviceInfo {
                id: name.clone(),
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate audio inputs: {}", e);
            Vec::new()
        }
    }
}

#[cfg(not(feature = "native-capture"))]
pub fn get_audio_input_devices() -> Vec<AudioDeviceInfo> {
    Vec::new()
}

//! Preview frames for the webview

use crate::capture::FrameSink;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use tauri::{AppHandle, Emitter};

/// Emits each frame as a `preview-frame` event holding a JPEG data URL,
/// or `null` once the preview is cleared
pub struct WebviewFrames {
    handle: AppHandle,
}

impl WebviewFrames {
    pub fn new(handle: AppHandle) -> Self {
        Self { handle }
    }
}

impl FrameSink for WebviewFrames {
    fn frame(&self, jpeg: Option<Bytes>) {
        let payload = jpeg.map(|data| data_url(&data));
        if let Err(e) = self.handle.emit("preview-frame", payload) {
            tracing::warn!("Failed to emit preview frame: {}", e);
        }
    }
}

fn data_url(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_become_jpeg_data_urls() {
        assert_eq!(data_url(&[0xFF, 0xD8, 0xFF, 0xD9]), "data:image/jpeg;base64,/9j/2Q==");
    }
}

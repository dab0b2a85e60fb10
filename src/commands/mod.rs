//! Tauri command handlers
//!
//! IPC handlers the webview calls through Tauri's invoke system.

pub mod preview;
pub mod stream;
pub mod system;

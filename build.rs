fn main() {
    // The webview shell needs its context generated; headless builds do not.
    #[cfg(feature = "desktop")]
    tauri_build::build()
}

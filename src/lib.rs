//! Livestream Monitor - camera/microphone capture with host metrics.
//!
//! Library crate behind the desktop (Tauri) and console front-ends. It owns
//! the capture controller, the chunk recorder and the metrics poller.

pub mod capture;
#[cfg(feature = "desktop")]
pub mod commands;
pub mod config;
#[cfg(not(feature = "desktop"))]
pub mod headless;
pub mod metrics;
pub mod network;
pub mod recorder;
pub mod session;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livestream_monitor=debug,tauri=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize the application
#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use crate::capture::FramePreview;
    use crate::commands::preview::WebviewFrames;
    use crate::commands::stream::SessionState;
    use crate::metrics::SystemInfoView;
    use crate::session::LiveSession;
    use std::sync::Arc;
    use tauri::{Emitter, Manager, RunEvent};
    use tokio::sync::broadcast::error::RecvError;

    init_tracing();
    tracing::info!("Starting Livestream Monitor v{}", env!("CARGO_PKG_VERSION"));

    let app = tauri::Builder::default()
        .invoke_handler(tauri::generate_handler![
            // Stream commands
            commands::stream::start_stream,
            commands::stream::stop_stream,
            commands::stream::get_stream_status,
            commands::stream::log_network_info,
            commands::stream::get_cameras,
            commands::stream::get_audio_devices,
            // System commands
            commands::system::get_system_info,
        ])
        .setup(|app| {
            let settings = config::load_or_init(&config::default_settings_path())?;
            let preview = Arc::new(FramePreview::new(Arc::new(WebviewFrames::new(
                app.handle().clone(),
            ))));
            // The poller task needs the async runtime entered
            let (session, mut events) = tauri::async_runtime::block_on(async {
                let session = LiveSession::mount_native(&settings, preview)?;
                let events = session.subscribe_events().await;
                Ok::<_, crate::utils::AppError>((session, events))
            })?;
            let mut info_rx = session.poller().subscribe();

            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                while info_rx.changed().await.is_ok() {
                    let view = info_rx
                        .borrow_and_update()
                        .as_ref()
                        .map(|polled| SystemInfoView::from(&polled.info));
                    if let Err(e) = handle.emit("system-info", view) {
                        tracing::warn!("Failed to emit system info: {}", e);
                    }
                }
            });

            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => {
                            if let Err(e) = handle.emit("stream-event", event) {
                                tracing::warn!("Failed to emit stream event: {}", e);
                            }
                        }
                        Err(RecvError::Lagged(n)) => {
                            tracing::warn!("Dropped {} stream events", n)
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });

            app.manage(SessionState::new(session));
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app, event| {
        if let RunEvent::Exit = event {
            if let Some(state) = app.try_state::<SessionState>() {
                tauri::async_runtime::block_on(async {
                    state.session.write().await.shutdown().await;
                });
            }
        }
    });
}

/// Initialize the application
#[cfg(not(feature = "desktop"))]
pub fn run() {
    init_tracing();
    tracing::info!("Starting Livestream Monitor v{}", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(headless::run()) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

//! Console front-end
//!
//! Reads commands from stdin while the session runs in the background.
//! Ctrl-C or end of input shuts the session down.

use crate::capture::{CaptureError, CaptureResult, LogPreview};
use crate::config::{self, AppSettings};
use crate::metrics::SystemInfoView;
use crate::recorder::{StreamEvent, StreamStatus};
use crate::session::LiveSession;
use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

const HELP: &str = "commands: start | stop | status | info | quit";

/// One console command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Stop,
    Status,
    Info,
    Quit,
    Help,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "stop" => Some(Command::Stop),
            "status" => Some(Command::Status),
            "info" => Some(Command::Info),
            "quit" | "exit" => Some(Command::Quit),
            "help" | "?" => Some(Command::Help),
            _ => None,
        }
    }
}

/// Load settings, mount the session and serve the console until asked to quit
pub async fn run() -> anyhow::Result<()> {
    let path = config::default_settings_path();
    let settings = config::load_or_init(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    let mut session = mount(&settings)?;
    spawn_event_logger(&session).await;

    println!("{HELP}");
    let result = serve(&session).await;

    session.shutdown().await;
    result
}

fn mount(settings: &AppSettings) -> anyhow::Result<LiveSession> {
    // Nothing to draw frames on in a console
    LiveSession::mount_native(settings, Arc::new(LogPreview))
        .context("Failed to set up the live session")
}

/// Mirror stream events into the log
async fn spawn_event_logger(session: &LiveSession) {
    let mut events = session.subscribe_events().await;
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(StreamEvent::NetworkLog { text }) => println!("{text}"),
                Ok(event) => tracing::debug!("Stream event: {:?}", event),
                Err(RecvError::Lagged(n)) => tracing::warn!("Missed {} stream events", n),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn serve(session: &LiveSession) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                return Ok(());
            }
            line = lines.next_line() => line.context("Failed to read from stdin")?,
        };

        let Some(line) = line else {
            tracing::info!("Input closed, shutting down");
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        match Command::parse(&line) {
            Some(Command::Quit) => return Ok(()),
            Some(command) => execute(session, command).await,
            None => println!("unknown command: {}\n{HELP}", line.trim()),
        }
    }
}

async fn execute(session: &LiveSession, command: Command) {
    match command {
        Command::Start => println!("{}", start_outcome(&session.start_stream().await)),
        Command::Stop => match session.stop_stream().await {
            Some(media) => println!(
                "stopped: {} bytes in {} chunks ({})",
                media.size(),
                media.chunk_count,
                media.mime_type
            ),
            None => println!("not streaming"),
        },
        Command::Status => {
            let status = session.status().await;
            let start = if status.can_start { "enabled" } else { "disabled" };
            let stop = if status.can_stop { "enabled" } else { "disabled" };
            println!(
                "{:?}: start {start}, stop {stop}, {} chunks / {} bytes buffered",
                status.state, status.buffered_chunks, status.buffered_bytes
            );
            if !status.network_log.is_empty() {
                println!("{}", status.network_log);
            }
        }
        Command::Info => println!("{}", render_info(session.system_info().as_ref())),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

/// Console line for a start attempt. Failures were already logged by the
/// controller, so only the resulting state is shown.
fn start_outcome(result: &CaptureResult<StreamStatus>) -> String {
    match result {
        Ok(status) => format!(
            "streaming {}",
            status.stream_id.as_deref().unwrap_or_default()
        ),
        Err(CaptureError::AlreadyActive) => "already streaming".to_string(),
        Err(_) => "not streaming".to_string(),
    }
}

/// Info panel text, with a placeholder before the first reading
fn render_info(view: Option<&SystemInfoView>) -> String {
    match view {
        Some(view) => view.to_string(),
        None => "Loading system information...".to_string(),
    }
}

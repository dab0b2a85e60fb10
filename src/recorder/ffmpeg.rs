//! FFmpeg recorder
//!
//! Runs FFmpeg with the capture inputs, encodes to the configured format and
//! writes the muxed output to stdout. Every read from stdout becomes one
//! chunk. FFmpeg only opens the devices once it runs, so `start` waits until
//! the process has either produced output or survived a short grace period.

use super::channel::{
    ChunkSink, MediaFormat, MediaRecorder, RecorderOptions, RecordingError, RecordingResult,
};
use async_trait::async_trait;
use bytes::BytesMut;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_millis(1500);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Stderr lines kept for diagnosing a failed start
const STDERR_HISTORY: usize = 20;

/// Preview stills: frame rate and width
const PREVIEW_FILTER: &str = "fps=5,scale=320:-2";

/// Recorder backed by an FFmpeg child process
pub struct FfmpegRecorder {
    ffmpeg_path: String,
    input_args: Vec<String>,
    options: RecorderOptions,
    format: MediaFormat,
    has_video: bool,
    has_audio: bool,
    read_chunk_bytes: usize,
    startup_grace: Duration,
    shutdown_timeout: Duration,
    preview_output: Option<PathBuf>,
    process: Option<Child>,
    stdin: Option<ChildStdin>,
    reader: Option<JoinHandle<RecordingResult<u64>>>,
}

enum Startup {
    Producing,
    Quiet,
    Exited(std::io::Result<ExitStatus>),
}

impl FfmpegRecorder {
    pub fn new(
        ffmpeg_path: String,
        input_args: Vec<String>,
        options: RecorderOptions,
        has_video: bool,
        has_audio: bool,
        read_chunk_bytes: usize,
    ) -> RecordingResult<Self> {
        let format = options.format()?;
        Ok(Self {
            ffmpeg_path,
            input_args,
            options,
            format,
            has_video,
            has_audio,
            read_chunk_bytes: read_chunk_bytes.max(1),
            startup_grace: DEFAULT_STARTUP_GRACE,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            preview_output: None,
            process: None,
            stdin: None,
            reader: None,
        })
    }

    /// How long a silent process must survive before `start` trusts it, and
    /// how long `stop` waits before killing it
    pub fn with_timeouts(mut self, startup_grace: Duration, shutdown_timeout: Duration) -> Self {
        self.startup_grace = startup_grace;
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// Also keep a low-rate JPEG still of the video at `path`
    pub fn with_preview_output(mut self, path: PathBuf) -> Self {
        self.preview_output = Some(path);
        self
    }

    /// Full FFmpeg argument list
    pub fn command_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y"]
            .map(String::from)
            .to_vec();
        args.extend(self.input_args.iter().cloned());

        if self.has_video {
            args.extend(["-c:v", self.format.video_codec()].map(String::from));
            args.extend(["-b:v".to_string(), self.options.video_bits_per_second.to_string()]);
            let tuning: &[&str] = match self.format {
                MediaFormat::WebmVp9 => &["-deadline", "realtime", "-cpu-used", "8", "-row-mt", "1"],
                MediaFormat::WebmVp8 => &["-deadline", "realtime", "-cpu-used", "8"],
                MediaFormat::Mp4H264 => &["-preset", "veryfast", "-tune", "zerolatency"],
            };
            args.extend(tuning.iter().map(|s| s.to_string()));
        } else {
            args.push("-vn".to_string());
        }

        if self.has_audio {
            args.extend(["-c:a", self.format.audio_codec()].map(String::from));
        } else {
            args.push("-an".to_string());
        }

        args.extend(self.format.muxer_args().iter().map(|s| s.to_string()));
        args.push("pipe:1".to_string());

        // Second output: a single JPEG rewritten in place
        if let (true, Some(path)) = (self.has_video, &self.preview_output) {
            args.extend(
                ["-an", "-vf", PREVIEW_FILTER, "-c:v", "mjpeg", "-q:v", "8", "-update", "1", "-f", "image2"]
                    .map(String::from),
            );
            args.push(path.to_string_lossy().into_owned());
        }
        args
    }
}

#[async_trait]
impl MediaRecorder for FfmpegRecorder {
    fn options(&self) -> &RecorderOptions {
        &self.options
    }

    async fn start(&mut self, sink: ChunkSink) -> RecordingResult<()> {
        if self.process.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }

        let args = self.command_args();
        tracing::debug!("Spawning {} {}", self.ffmpeg_path, args.join(" "));

        let mut process = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RecordingError::Encoder(format!("Failed to start FFmpeg: {}", e)))?;

        let mut stdout = process
            .stdout
            .take()
            .ok_or_else(|| RecordingError::Encoder("Failed to capture FFmpeg stdout".to_string()))?;

        let stderr_history = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_HISTORY)));
        let stderr_task = process.stderr.take().map(|stderr| {
            let history = stderr_history.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::warn!("ffmpeg: {}", line);
                    let mut history = history.lock();
                    if history.len() == STDERR_HISTORY {
                        history.pop_front();
                    }
                    history.push_back(line);
                }
            })
        });

        let (first_tx, first_rx) = oneshot::channel::<()>();
        let chunk_size = self.read_chunk_bytes;
        let mut reader = tokio::spawn(async move {
            let mut first_tx = Some(first_tx);
            let mut emitted = 0u64;
            loop {
                let mut buf = BytesMut::with_capacity(chunk_size);
                let read = stdout.read_buf(&mut buf).await?;
                if read == 0 {
                    break;
                }
                if let Some(tx) = first_tx.take() {
                    let _ = tx.send(());
                }
                if sink.push(buf.freeze()).await? {
                    emitted += 1;
                }
            }
            Ok::<u64, RecordingError>(emitted)
        });

        let startup = tokio::select! {
            status = process.wait() => Startup::Exited(status),
            first = first_rx => match first {
                Ok(()) => Startup::Producing,
                // Output closed without a byte: the process is on its way out
                Err(_) => match tokio::time::timeout(self.startup_grace, process.wait()).await {
                    Ok(status) => Startup::Exited(status),
                    Err(_) => Startup::Quiet,
                },
            },
            _ = tokio::time::sleep(self.startup_grace) => Startup::Quiet,
        };

        match startup {
            Startup::Producing => {}
            Startup::Quiet => {
                tracing::debug!("FFmpeg running, no output yet after {:?}", self.startup_grace);
            }
            Startup::Exited(status) => {
                let status = match status {
                    Ok(status) => status.to_string(),
                    Err(e) => e.to_string(),
                };
                // Both pipes are closed once the process is gone
                if let Some(task) = stderr_task {
                    let _ = tokio::time::timeout(Duration::from_secs(1), task).await;
                }
                if tokio::time::timeout(Duration::from_secs(1), &mut reader).await.is_err() {
                    reader.abort();
                }

                let lines: Vec<String> = stderr_history.lock().iter().cloned().collect();
                let error = classify_startup_failure(&status, &lines);
                tracing::error!("FFmpeg exited during startup: {}", error);
                return Err(error);
            }
        }

        self.stdin = process.stdin.take();
        self.process = Some(process);
        self.reader = Some(reader);

        tracing::info!(
            "FFmpeg recorder started ({}, {} bit/s)",
            self.options.mime_type,
            self.options.video_bits_per_second
        );
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        let Some(mut process) = self.process.take() else {
            return Err(RecordingError::NotRecording);
        };

        // 'q' asks FFmpeg to finish the container cleanly
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.write_all(b"q").await {
                tracing::debug!("FFmpeg stdin already closed: {}", e);
            }
            drop(stdin);
        }

        match tokio::time::timeout(self.shutdown_timeout, process.wait()).await {
            Ok(Ok(status)) if !status.success() => {
                tracing::warn!("FFmpeg recorder exited with {}", status);
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                tracing::warn!(
                    "FFmpeg did not exit within {:?}, killing it",
                    self.shutdown_timeout
                );
                process.kill().await?;
            }
        }

        if let Some(reader) = self.reader.take() {
            match reader.await {
                Ok(Ok(emitted)) => tracing::info!("FFmpeg recorder stopped after {} chunks", emitted),
                Ok(Err(e)) => tracing::error!("FFmpeg output reader failed: {}", e),
                Err(e) => tracing::error!("FFmpeg output reader panicked: {}", e),
            }
        }
        Ok(())
    }

    /// False once FFmpeg has closed its output, even before `stop`
    fn is_recording(&self) -> bool {
        self.process.is_some() && self.reader.as_ref().is_some_and(|r| !r.is_finished())
    }
}

/// Map an FFmpeg that died before producing output onto a recorder error
fn classify_startup_failure(status: &str, stderr: &[String]) -> RecordingError {
    let detail = stderr
        .last()
        .cloned()
        .unwrap_or_else(|| format!("FFmpeg exited with {status}"));
    let text = stderr.join("\n").to_ascii_lowercase();

    let denied = ["permission denied", "not authorized", "access denied", "operation not permitted"];
    let missing = [
        "no such file or directory",
        "no such device",
        "cannot open audio device",
        "could not find video device",
        "could not find audio",
        "could not enumerate",
        "input/output error",
        "i/o error",
        "device or resource busy",
    ];

    if denied.iter().any(|needle| text.contains(needle)) {
        RecordingError::InputPermissionDenied(detail)
    } else if missing.iter().any(|needle| text.contains(needle)) {
        RecordingError::InputUnavailable(detail)
    } else {
        RecordingError::Encoder(detail)
    }
}

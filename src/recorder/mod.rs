//! Recording system module
//!
//! This module implements local recording of the live feed:
//! - MediaRecorder trait and the bounded chunk channel feeding the assembler
//! - ChunkAssembler joining segments in arrival order
//! - CaptureController driving start/stop of stream and recorder

pub mod assembler;
pub mod channel;
pub mod controller;
pub mod ffmpeg;
pub mod state;

pub use assembler::{ChunkAssembler, ChunkBuffer, RecordedMedia};
pub use channel::{
    BackpressurePolicy, ChunkSink, MediaFormat, MediaRecorder, RecorderOptions, RecordingError,
    RecordingResult,
};
pub use controller::CaptureController;
pub use ffmpeg::FfmpegRecorder;
pub use state::{StreamEvent, StreamState, StreamStatus};

//! Chunk assembly
//!
//! Drains the recorder's chunk channel into a shared buffer in arrival order
//! and joins the buffered segments into a single media object on stop.

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Ordered chunk sequence shared between the assembler task and the controller
#[derive(Debug, Clone, Default)]
pub struct ChunkBuffer {
    chunks: Arc<Mutex<Vec<Bytes>>>,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&self, chunk: Bytes) {
        self.chunks.lock().push(chunk);
    }

    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }

    /// Total buffered bytes
    pub fn byte_len(&self) -> usize {
        self.chunks.lock().iter().map(Bytes::len).sum()
    }

    /// Take all buffered chunks, leaving the buffer empty
    pub fn take(&self) -> Vec<Bytes> {
        std::mem::take(&mut *self.chunks.lock())
    }

    pub fn clear(&self) {
        self.chunks.lock().clear();
    }
}

/// Consumer task for one recording
pub struct ChunkAssembler {
    buffer: ChunkBuffer,
    handle: JoinHandle<u64>,
}

impl ChunkAssembler {
    /// Spawn a task appending every received chunk to `buffer`
    pub fn spawn(mut rx: mpsc::Receiver<Bytes>, buffer: ChunkBuffer) -> Self {
        let task_buffer = buffer.clone();
        let handle = tokio::spawn(async move {
            let mut received = 0u64;
            while let Some(chunk) = rx.recv().await {
                if chunk.is_empty() {
                    continue;
                }
                tracing::trace!("Buffered chunk #{} ({} bytes)", received, chunk.len());
                task_buffer.append(chunk);
                received += 1;
            }
            received
        });

        Self { buffer, handle }
    }

    /// Wait until every producer has gone away, then join the chunks.
    ///
    /// The buffer is empty when this returns.
    pub async fn finish(self, mime_type: &str) -> RecordedMedia {
        match self.handle.await {
            Ok(received) => tracing::debug!("Assembler drained {} chunks", received),
            Err(e) => tracing::error!("Assembler task failed: {}", e),
        }

        let media = RecordedMedia::assemble(self.buffer.take(), mime_type);
        self.buffer.clear();
        media
    }
}

/// A complete recording held in memory
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedMedia {
    pub id: Uuid,
    pub mime_type: String,
    #[serde(skip)]
    pub data: Bytes,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

impl RecordedMedia {
    /// Concatenate chunks in the given order
    pub fn assemble(chunks: Vec<Bytes>, mime_type: &str) -> Self {
        let chunk_count = chunks.len();
        let total = chunks.iter().map(Bytes::len).sum();
        let mut data = BytesMut::with_capacity(total);
        for chunk in &chunks {
            data.extend_from_slice(chunk);
        }

        Self {
            id: Uuid::new_v4(),
            mime_type: mime_type.to_string(),
            data: data.freeze(),
            chunk_count,
            created_at: Utc::now(),
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

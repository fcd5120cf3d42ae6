//! Dedicated writer task for outbound frames.
//!
//! Responses are produced from whatever thread the handler replies on, so
//! they are queued on an mpsc channel and a single task owns the write half.
//! Frames that are ready together are written with one vectored write.
//!
//! ```text
//! Replyer 1 ─┐
//! Replyer 2 ─┼─► mpsc::Sender<Bytes> ─► Writer Task ─► AsyncWrite
//! Replyer N ─┘
//! ```

use std::io::IoSlice;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, WireError};
use crate::rpc::RpcChannel;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Frames that may queue before sends start failing.
    pub channel_capacity: usize,
    /// Name reported by the handle for diagnostics.
    pub name: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            name: "stream".to_string(),
        }
    }
}

/// Handle for queueing frames on the writer task.
///
/// Cheap to clone. Implements [`RpcChannel`] so it can be handed straight
/// to the RPC server.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Bytes>,
    name: Arc<str>,
}

impl WriterHandle {
    /// Queue a frame, waiting for room if the queue is full.
    pub async fn send(&self, frame: Bytes) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| WireError::ConnectionClosed)
    }

    /// Queue a frame without waiting.
    ///
    /// # Errors
    ///
    /// `Io(WouldBlock)` when the queue is full, `ConnectionClosed` once the
    /// writer task has stopped.
    pub fn try_send(&self, frame: Bytes) -> Result<()> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => WireError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "writer queue full",
            )),
            mpsc::error::TrySendError::Closed(_) => WireError::ConnectionClosed,
        })
    }

    /// Check if the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl RpcChannel for WriterHandle {
    fn send_response(&self, frame: Bytes) -> Result<()> {
        self.try_send(frame)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The task ends with `Ok(())` once every handle is dropped and the queue
/// is drained, or with the first write error.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let handle = WriterHandle {
        tx,
        name: Arc::from(config.name),
    };
    let task = tokio::spawn(writer_loop(rx, writer));
    (handle, task)
}

/// Spawn the writer task with default configuration.
pub fn spawn_writer_task_default<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    spawn_writer_task(writer, WriterConfig::default())
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<Bytes>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
    while let Some(first) = rx.recv().await {
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::error!("writer task stopped: {}", e);
            return Err(e);
        }
        batch.clear();
    }
    tracing::debug!("writer task finished");
    Ok(())
}

/// Write a batch of frames using write_vectored, resuming after partial writes.
async fn write_batch<W>(writer: &mut W, batch: &[Bytes]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(Bytes::len).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(WireError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for remaining data after partial write.
fn build_remaining_slices(batch: &[Bytes], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut frame_start = 0;

    for frame in batch {
        let frame_end = frame_start + frame.len();
        if skip_bytes < frame_end && !frame.is_empty() {
            let start_in_frame = skip_bytes.saturating_sub(frame_start);
            slices.push(IoSlice::new(&frame[start_in_frame..]));
        }
        frame_start = frame_end;
    }

    slices
}

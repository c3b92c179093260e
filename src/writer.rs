//! Dedicated writer task for the socket's write half.
//!
//! Callers never touch the socket directly. Every outgoing call is queued on
//! an mpsc channel and a single task writes it, so frames are never
//! interleaved and ready frames go out together in one vectored write.
//!
//! ```text
//! call() 1 ─┐
//! call() 2 ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► TCP
//! call() N ─┘
//! ```

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{GbxError, Result};
use crate::protocol::{Header, HEADER_SIZE};

/// Default capacity of the outgoing frame queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A frame ready to be written to the socket.
#[derive(Debug)]
pub struct OutboundFrame {
    pub header: [u8; HEADER_SIZE],
    pub payload: Bytes,
}

impl OutboundFrame {
    #[inline]
    pub fn new(handle: u32, payload: Bytes) -> Self {
        Self {
            header: Header::new(payload.len() as u32, handle).encode(),
            payload,
        }
    }

    /// Total size of this frame (header + payload).
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Handle for queueing frames on the writer task.
///
/// Cheaply cloneable. Once every handle is dropped the writer task flushes
/// what it has and exits.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame, waiting for room if the channel is full.
    ///
    /// Fails with `ConnectionClosed` once the writer task has stopped.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| GbxError::ConnectionClosed)
    }

    /// `true` once the writer task has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending frames.
///
/// The returned `JoinHandle` resolves when the channel closes (`Ok`) or a
/// write fails (`Err`).
pub fn spawn_writer_task<W>(writer: W, channel_capacity: usize) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(channel_capacity.max(1));
    let task = tokio::spawn(async move {
        let result = writer_loop(rx, writer).await;
        if let Err(e) = &result {
            tracing::warn!(error = %e, "writer task stopped");
        }
        result
    });
    (WriterHandle { tx }, task)
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
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

        write_batch(&mut writer, &batch).await?;
        tracing::trace!(frames = batch.len(), "batch written");
        batch.clear();
    }
    let _ = writer.shutdown().await;
    Ok(())
}

/// Write a batch of frames using scatter/gather I/O (write_vectored).
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(OutboundFrame::size).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(GbxError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for the data left after `skip_bytes` were written.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for frame in batch {
        for part in [&frame.header[..], &frame.payload[..]] {
            let end = offset + part.len();
            if skip_bytes < end && !part.is_empty() {
                slices.push(IoSlice::new(&part[skip_bytes.saturating_sub(offset)..]));
            }
            offset = end;
        }
    }

    slices
}

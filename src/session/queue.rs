//! Per-subscriber delivery queue
//!
//! A bounded single-producer / single-consumer queue of chunks built on
//! `tokio::sync::broadcast` with exactly one receiver. Pushing never waits:
//! when the queue is full the oldest queued chunk is overwritten, and the
//! receiver skips ahead to the oldest chunk still retained.
//!
//! Capacities are powers of two; other values are rounded up.

use tokio::sync::broadcast;

use crate::registry::Chunk;

/// Create a delivery queue holding at most `capacity` chunks, rounded up to
/// the next power of two
pub fn delivery_queue(capacity: usize) -> (ChunkSender, ChunkReceiver) {
    let (tx, rx) = broadcast::channel(capacity.max(1).next_power_of_two());
    (ChunkSender { tx }, ChunkReceiver { rx, dropped: 0 })
}

/// Producer half, held by the channel registry
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: broadcast::Sender<Chunk>,
}

impl ChunkSender {
    /// Enqueue a chunk without waiting
    ///
    /// Returns `false` if the receiving session is gone.
    pub fn push(&self, chunk: Chunk) -> bool {
        self.tx.send(chunk).is_ok()
    }
}

/// Consumer half, drained by the session's delivery loop
#[derive(Debug)]
pub struct ChunkReceiver {
    rx: broadcast::Receiver<Chunk>,
    dropped: u64,
}

impl ChunkReceiver {
    /// Wait for the next chunk
    ///
    /// Returns `None` once every sender is gone and the queue is drained.
    /// Chunks overwritten by overflow are skipped and counted.
    pub async fn recv(&mut self) -> Option<Chunk> {
        loop {
            match self.rx.recv().await {
                Ok(chunk) => return Some(chunk),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.dropped += skipped;
                    tracing::debug!(skipped, "Delivery queue overflowed, dropped oldest chunks");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Total chunks dropped to overflow so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

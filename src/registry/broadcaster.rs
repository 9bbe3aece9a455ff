//! Per-channel fan-out
//!
//! Pushes each chunk onto the delivery queue of every current subscriber of
//! one channel. Enqueueing never waits, so a slow subscriber cannot stall the
//! source reader or any other subscriber.

use std::sync::Arc;

use super::chunk::{ChannelName, Chunk};
use super::store::ChannelRegistry;

/// Broadcaster bound to a single channel
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ChannelRegistry>,
    channel: ChannelName,
}

impl Broadcaster {
    /// Create a broadcaster for `channel`
    pub fn new(registry: Arc<ChannelRegistry>, channel: ChannelName) -> Self {
        Self { registry, channel }
    }

    /// The channel this broadcaster feeds
    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// Enqueue a chunk for every current subscriber
    ///
    /// Returns the number of queues that accepted the chunk. Subscribers
    /// whose receiving side is already gone are skipped.
    pub async fn broadcast(&self, chunk: Chunk) -> usize {
        let bytes = chunk.len();
        let entry = self.registry.channel(&self.channel).await;
        let mut delivered = 0;

        self.registry
            .for_each_subscriber(&self.channel, |session_id, tx| {
                if tx.push(chunk.clone()) {
                    delivered += 1;
                } else {
                    tracing::trace!(
                        channel = %self.channel,
                        session_id = session_id,
                        "Skipping closed delivery queue"
                    );
                }
            })
            .await;

        entry.counters.record_chunk(bytes, delivered);

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_all_subscribers_in_order() {
        let registry = Arc::new(ChannelRegistry::new());
        let channel = ChannelName::mainstream();
        let broadcaster = Broadcaster::new(Arc::clone(&registry), channel.clone());

        let mut receivers = Vec::new();
        for id in 1..=3 {
            receivers.push(registry.subscribe(&channel, id).await.unwrap());
        }

        let a = Chunk::copy_from_slice(&[0xAA; 32]);
        let b = Chunk::copy_from_slice(&[0xBB, 0x01]);
        assert_eq!(broadcaster.broadcast(a.clone()).await, 3);
        assert_eq!(broadcaster.broadcast(b.clone()).await, 3);

        for rx in receivers.iter_mut() {
            assert_eq!(rx.recv().await, Some(a.clone()));
            assert_eq!(rx.recv().await, Some(b.clone()));
        }

        let stats = registry.channel_stats(&channel).await.unwrap();
        assert_eq!(stats.chunks_read, 2);
        assert_eq!(stats.bytes_read, 34);
        assert_eq!(stats.deliveries, 6);
    }

    #[tokio::test]
    async fn test_late_joiner_misses_earlier_chunks() {
        let registry = Arc::new(ChannelRegistry::new());
        let channel = ChannelName::mainstream();
        let broadcaster = Broadcaster::new(Arc::clone(&registry), channel.clone());

        let mut early = registry.subscribe(&channel, 1).await.unwrap();
        broadcaster.broadcast(Chunk::copy_from_slice(b"A")).await;

        let mut late = registry.subscribe(&channel, 2).await.unwrap();
        broadcaster.broadcast(Chunk::copy_from_slice(b"B")).await;

        assert_eq!(early.recv().await, Some(Chunk::copy_from_slice(b"A")));
        assert_eq!(early.recv().await, Some(Chunk::copy_from_slice(b"B")));

        assert_eq!(late.recv().await, Some(Chunk::copy_from_slice(b"B")));
        registry.unsubscribe(&channel, 2).await;
        assert_eq!(late.recv().await, None);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers() {
        let registry = Arc::new(ChannelRegistry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry), ChannelName::substream());

        assert_eq!(broadcaster.broadcast(Chunk::copy_from_slice(b"x")).await, 0);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_skipped() {
        let registry = Arc::new(ChannelRegistry::new());
        let channel = ChannelName::mainstream();
        let broadcaster = Broadcaster::new(Arc::clone(&registry), channel.clone());

        let gone = registry.subscribe(&channel, 1).await.unwrap();
        let mut alive = registry.subscribe(&channel, 2).await.unwrap();
        drop(gone);

        assert_eq!(broadcaster.broadcast(Chunk::copy_from_slice(b"z")).await, 1);
        assert_eq!(alive.recv().await, Some(Chunk::copy_from_slice(b"z")));
    }
}

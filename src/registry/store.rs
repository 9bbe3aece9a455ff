//! Channel registry implementation
//!
//! The central registry that tracks every channel and the delivery queues
//! of the sessions subscribed to it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::session::queue::{delivery_queue, ChunkReceiver, ChunkSender};
use crate::stats::ChannelStats;

use super::chunk::{ChannelName, SessionId};
use super::config::RegistryConfig;
use super::entry::ChannelEntry;

/// Registry of all channels and their subscribers
///
/// Thread-safe via `RwLock`. Read-heavy workloads (subscriber count checks,
/// broadcasting) benefit from the concurrent read access. Channels are
/// created the first time they are referenced and live as long as the
/// registry.
pub struct ChannelRegistry {
    /// Map of channel name to channel entry
    channels: RwLock<HashMap<ChannelName, Arc<ChannelEntry>>>,

    /// Configuration
    config: RegistryConfig,
}

impl ChannelRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get a channel entry, creating it on first reference
    pub async fn channel(&self, name: &ChannelName) -> Arc<ChannelEntry> {
        if let Some(entry) = self.channels.read().await.get(name) {
            return Arc::clone(entry);
        }

        let mut channels = self.channels.write().await;
        let entry = channels.entry(name.clone()).or_insert_with(|| {
            tracing::debug!(channel = %name, "Channel created");
            Arc::new(ChannelEntry::new())
        });
        Arc::clone(entry)
    }

    /// Number of live subscribers on a channel
    pub async fn subscriber_count(&self, name: &ChannelName) -> usize {
        self.channel(name).await.subscriber_count()
    }

    /// Subscribe a session to a channel
    ///
    /// Returns the receiving end of the session's delivery queue, or `None`
    /// if the session is already subscribed (the call is then a no-op).
    pub async fn subscribe(
        &self,
        name: &ChannelName,
        session_id: SessionId,
    ) -> Option<ChunkReceiver> {
        let entry = self.channel(name).await;
        let (tx, rx) = delivery_queue(self.config.queue_capacity);

        if !entry.insert(session_id, tx).await {
            tracing::debug!(
                channel = %name,
                session_id = session_id,
                "Session already subscribed"
            );
            return None;
        }

        tracing::info!(
            channel = %name,
            session_id = session_id,
            subscribers = entry.subscriber_count(),
            "Subscriber added"
        );

        Some(rx)
    }

    /// Unsubscribe a session from a channel
    ///
    /// Safe to call more than once; returns whether anything was removed.
    pub async fn unsubscribe(&self, name: &ChannelName, session_id: SessionId) -> bool {
        let entry = self.channel(name).await;
        let removed = entry.remove(session_id).await;

        if removed {
            tracing::info!(
                channel = %name,
                session_id = session_id,
                subscribers = entry.subscriber_count(),
                "Subscriber removed"
            );
        }

        removed
    }

    /// Apply `f` to every subscriber of a channel
    ///
    /// The subscriber set is read-locked while `f` runs, so no session is
    /// visited after its `unsubscribe` has returned. Sessions that join while
    /// the iteration is running are not visited. Returns the number of
    /// sessions visited.
    pub async fn for_each_subscriber<F>(&self, name: &ChannelName, mut f: F) -> usize
    where
        F: FnMut(SessionId, &ChunkSender),
    {
        let entry = self.channel(name).await;
        let subscribers = entry.subscribers.read().await;

        for (session_id, tx) in subscribers.iter() {
            f(*session_id, tx);
        }

        subscribers.len()
    }

    /// Wait until a channel has at least one subscriber
    ///
    /// Woken immediately when a session subscribes; `poll_interval` bounds
    /// how long a missed wake-up can go unnoticed.
    pub async fn wait_for_subscribers(&self, name: &ChannelName, poll_interval: Duration) {
        let entry = self.channel(name).await;
        wait_for_membership(&entry, poll_interval, |count| count > 0).await;
    }

    /// Wait until a channel has no subscribers left
    pub async fn wait_until_idle(&self, name: &ChannelName, poll_interval: Duration) {
        let entry = self.channel(name).await;
        wait_for_membership(&entry, poll_interval, |count| count == 0).await;
    }

    /// Get channel statistics, if the channel has been referenced
    pub async fn channel_stats(&self, name: &ChannelName) -> Option<ChannelStats> {
        let channels = self.channels.read().await;
        channels.get(name).map(|entry| entry.stats())
    }

    /// Get total number of channels
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_membership<F>(entry: &ChannelEntry, poll_interval: Duration, done: F)
where
    F: Fn(usize) -> bool,
{
    loop {
        // Register for the wake-up before checking, so a change between the
        // check and the wait is not missed
        let notified = entry.membership_changed.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if done(entry.subscriber_count()) {
            return;
        }

        tokio::select! {
            _ = &mut notified => {}
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}

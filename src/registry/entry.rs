//! Channel entry types
//!
//! This module defines the per-channel state stored in the registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Notify, RwLock};

use crate::session::queue::ChunkSender;
use crate::stats::{ChannelCounters, ChannelStats};

use super::chunk::SessionId;

/// Entry for a single channel in the registry
pub struct ChannelEntry {
    /// Delivery queues of the live subscribers, keyed by session
    pub(super) subscribers: RwLock<HashMap<SessionId, ChunkSender>>,

    /// Mirror of `subscribers.len()` readable without taking the lock
    subscriber_count: AtomicUsize,

    /// Signalled whenever a subscriber joins or leaves
    pub(super) membership_changed: Notify,

    /// Read and delivery counters
    pub counters: ChannelCounters,
}

impl ChannelEntry {
    pub(super) fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            subscriber_count: AtomicUsize::new(0),
            membership_changed: Notify::new(),
            counters: ChannelCounters::new(),
        }
    }

    /// Get the number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::Acquire)
    }

    /// Insert a subscriber; `false` if the session was already present
    pub(super) async fn insert(&self, session_id: SessionId, tx: ChunkSender) -> bool {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.contains_key(&session_id) {
            return false;
        }
        subscribers.insert(session_id, tx);
        self.subscriber_count.store(subscribers.len(), Ordering::Release);
        drop(subscribers);

        self.membership_changed.notify_waiters();
        true
    }

    /// Remove a subscriber; `false` if the session was not present
    pub(super) async fn remove(&self, session_id: SessionId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let removed = subscribers.remove(&session_id).is_some();
        self.subscriber_count.store(subscribers.len(), Ordering::Release);
        drop(subscribers);

        if removed {
            self.membership_changed.notify_waiters();
        }
        removed
    }

    /// Statistics snapshot
    pub fn stats(&self) -> ChannelStats {
        self.counters.snapshot(self.subscriber_count())
    }
}

//! Live session table
//!
//! Tracks the handle of every running session so the server can tear down
//! all viewers of a channel at once, for example when the channel's source
//! is exhausted.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::registry::{ChannelName, SessionId};

use super::state::SessionHandle;

/// Table of live sessions, keyed by session id
#[derive(Default)]
pub struct SessionTable {
    inner: RwLock<TableInner>,
}

#[derive(Default)]
struct TableInner {
    sessions: HashMap<SessionId, SessionHandle>,
    /// Channels whose source has ended; no new sessions are accepted
    ended: HashSet<ChannelName>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session
    ///
    /// Returns `false` and leaves the table unchanged if the session's
    /// channel has already ended.
    pub async fn insert(&self, handle: SessionHandle) -> bool {
        let mut inner = self.inner.write().await;
        if inner.ended.contains(handle.channel()) {
            return false;
        }
        inner.sessions.insert(handle.id(), handle);
        true
    }

    /// Forget a finished session
    pub async fn remove(&self, session_id: SessionId) -> bool {
        self.inner.write().await.sessions.remove(&session_id).is_some()
    }

    /// Whether `channel` has ended
    pub async fn is_ended(&self, channel: &ChannelName) -> bool {
        self.inner.read().await.ended.contains(channel)
    }

    /// Mark `channel` as ended and close every session on it
    ///
    /// Returns the number of sessions asked to close.
    pub async fn end_channel(&self, channel: &ChannelName) -> usize {
        let mut inner = self.inner.write().await;
        inner.ended.insert(channel.clone());

        let mut closed = 0;
        for handle in inner.sessions.values() {
            if handle.channel() == channel {
                handle.close();
                closed += 1;
            }
        }

        tracing::info!(channel = %channel, sessions = closed, "Channel ended");
        closed
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

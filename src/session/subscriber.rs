//! Subscriber session
//!
//! Drives one connected consumer through `Connecting → Active → Closing →
//! Closed`. While active, a delivery loop drains the session's queue into the
//! connection and a separate task waits for the peer to go away. Whichever
//! path ends the session, it is unsubscribed once and its connection is
//! closed once.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::registry::{ChannelName, ChannelRegistry, SessionId};
use crate::stats::SessionStats;

use super::state::{CloseReason, CloseSignal, SessionHandle, SessionPhase, SessionState};
use super::transport::{ChunkSink, PeerListener};

/// Outcome of a finished session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Session ID
    pub id: SessionId,
    /// Channel the session was subscribed to
    pub channel: ChannelName,
    /// Why the session ended
    pub reason: CloseReason,
    /// Delivery statistics
    pub stats: SessionStats,
}

/// One connected consumer of a channel
pub struct SubscriberSession {
    state: SessionState,
    registry: Arc<ChannelRegistry>,
    signal: Arc<CloseSignal>,
    stats: SessionStats,
}

impl SubscriberSession {
    /// Create a session; it is closed automatically when `shutdown` fires
    pub fn new(
        id: SessionId,
        channel: ChannelName,
        registry: Arc<ChannelRegistry>,
        shutdown: &CancellationToken,
    ) -> Self {
        Self {
            state: SessionState::new(id, channel),
            registry,
            signal: Arc::new(CloseSignal::child_of(shutdown)),
            stats: SessionStats::new(),
        }
    }

    /// Session ID
    pub fn id(&self) -> SessionId {
        self.state.id
    }

    /// Channel this session subscribes to
    pub fn channel(&self) -> &ChannelName {
        &self.state.channel
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    /// Handle for closing the session from elsewhere
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(
            self.state.id,
            self.state.channel.clone(),
            Arc::clone(&self.signal),
        )
    }

    /// Run the session to completion
    pub async fn run<S, L>(mut self, mut sink: S, listener: L) -> SessionSummary
    where
        S: ChunkSink,
        L: PeerListener,
    {
        let id = self.state.id;
        let channel = self.state.channel.clone();

        let Some(mut rx) = self.registry.subscribe(&channel, id).await else {
            tracing::warn!(
                channel = %channel,
                session_id = id,
                "Session id already subscribed, rejecting"
            );
            self.state.begin_closing(CloseReason::Rejected);
            self.close_sink(&mut sink).await;
            return self.finish(CloseReason::Rejected);
        };

        self.state.activate();

        let listener_signal = Arc::clone(&self.signal);
        let listener_task = tokio::spawn(async move {
            tokio::select! {
                _ = listener.closed() => listener_signal.close(CloseReason::PeerClosed),
                _ = listener_signal.cancelled() => {}
            }
        });

        let reason = loop {
            tokio::select! {
                biased;
                _ = self.signal.cancelled() => break self.signal.reason(),
                next = rx.recv() => {
                    let Some(chunk) = next else {
                        break CloseReason::Unsubscribed;
                    };
                    let len = chunk.len();

                    tokio::select! {
                        biased;
                        _ = self.signal.cancelled() => break self.signal.reason(),
                        result = sink.send_chunk(chunk) => {
                            if let Err(e) = result {
                                tracing::debug!(
                                    channel = %channel,
                                    session_id = id,
                                    error = %e,
                                    "Delivery write failed"
                                );
                                break CloseReason::WriteFailed;
                            }
                            self.stats.record_sent(len);
                        }
                    }
                }
            }
        };

        self.state.begin_closing(reason);
        self.signal.close(reason);

        self.registry.unsubscribe(&channel, id).await;
        if let Err(e) = listener_task.await {
            tracing::debug!(session_id = id, error = %e, "Peer listener task failed");
        }
        self.close_sink(&mut sink).await;
        drop(sink);

        self.stats.chunks_dropped = rx.dropped();
        self.finish(reason)
    }

    async fn close_sink<S: ChunkSink>(&self, sink: &mut S) {
        if let Err(e) = sink.close().await {
            tracing::debug!(
                session_id = self.state.id,
                error = %e,
                "Error closing connection"
            );
        }
    }

    fn finish(mut self, reason: CloseReason) -> SessionSummary {
        self.stats.duration = self.state.active_duration();
        self.state.finish();

        tracing::info!(
            channel = %self.state.channel,
            session_id = self.state.id,
            reason = %reason,
            chunks_sent = self.stats.chunks_sent,
            chunks_dropped = self.stats.chunks_dropped,
            "Session closed"
        );

        SessionSummary {
            id: self.state.id,
            channel: self.state.channel,
            reason,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::{mpsc, oneshot};

    use super::*;
    use crate::error::{Error, Result};
    use crate::registry::{Broadcaster, Chunk};

    struct TestSink {
        tx: mpsc::UnboundedSender<Chunk>,
        closes: Arc<AtomicUsize>,
        fail_writes: bool,
    }

    impl ChunkSink for TestSink {
        async fn send_chunk(&mut self, chunk: Chunk) -> Result<()> {
            if self.fail_writes {
                return Err(Error::Transport("broken pipe".into()));
            }
            let _ = self.tx.send(chunk);
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct TestListener(oneshot::Receiver<()>);

    impl PeerListener for TestListener {
        async fn closed(self) {
            let _ = self.0.await;
        }
    }

    struct Harness {
        registry: Arc<ChannelRegistry>,
        shutdown: CancellationToken,
        delivered: mpsc::UnboundedReceiver<Chunk>,
        closes: Arc<AtomicUsize>,
        peer_close: Option<oneshot::Sender<()>>,
        handle: SessionHandle,
        task: tokio::task::JoinHandle<SessionSummary>,
    }

    async fn start(fail_writes: bool) -> Harness {
        let registry = Arc::new(ChannelRegistry::new());
        let shutdown = CancellationToken::new();
        let (tx, delivered) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        let (peer_close, peer_rx) = oneshot::channel();

        let session = SubscriberSession::new(
            1,
            ChannelName::mainstream(),
            Arc::clone(&registry),
            &shutdown,
        );
        let handle = session.handle();
        let sink = TestSink {
            tx,
            closes: Arc::clone(&closes),
            fail_writes,
        };
        let task = tokio::spawn(session.run(sink, TestListener(peer_rx)));

        wait_for_count(&registry, 1).await;

        Harness {
            registry,
            shutdown,
            delivered,
            closes,
            peer_close: Some(peer_close),
            handle,
            task,
        }
    }

    async fn wait_for_count(registry: &ChannelRegistry, expected: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while registry.subscriber_count(&ChannelName::mainstream()).await != expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscriber count never reached expected value");
    }

    #[tokio::test]
    async fn test_delivers_in_order_until_peer_closes() {
        let mut h = start(false).await;
        let broadcaster = Broadcaster::new(Arc::clone(&h.registry), ChannelName::mainstream());

        broadcaster.broadcast(Chunk::copy_from_slice(&[1, 2])).await;
        broadcaster.broadcast(Chunk::copy_from_slice(&[3])).await;

        assert_eq!(h.delivered.recv().await, Some(Chunk::copy_from_slice(&[1, 2])));
        assert_eq!(h.delivered.recv().await, Some(Chunk::copy_from_slice(&[3])));

        h.peer_close.take().unwrap().send(()).unwrap();
        let summary = h.task.await.unwrap();

        assert_eq!(summary.reason, CloseReason::PeerClosed);
        assert_eq!(summary.stats.chunks_sent, 2);
        assert_eq!(summary.stats.bytes_sent, 3);
        assert_eq!(h.registry.subscriber_count(&ChannelName::mainstream()).await, 0);
        assert_eq!(h.closes.load(Ordering::SeqCst), 1);

        // Nothing reaches the closed session afterwards
        assert_eq!(broadcaster.broadcast(Chunk::copy_from_slice(&[4])).await, 0);
        assert_eq!(h.delivered.recv().await, None);
    }

    #[tokio::test]
    async fn test_peer_hangup_without_close_frame() {
        let mut h = start(false).await;

        // Dropping the sender resolves the listener just like a close
        drop(h.peer_close.take());
        let summary = h.task.await.unwrap();

        assert_eq!(summary.reason, CloseReason::PeerClosed);
        assert_eq!(h.registry.subscriber_count(&ChannelName::mainstream()).await, 0);
    }

    #[tokio::test]
    async fn test_server_side_close() {
        let h = start(false).await;
        assert!(!h.handle.is_closed());

        h.handle.close();
        let summary = h.task.await.unwrap();

        assert_eq!(summary.reason, CloseReason::ServerClosed);
        assert_eq!(h.closes.load(Ordering::SeqCst), 1);
        assert_eq!(h.registry.subscriber_count(&ChannelName::mainstream()).await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_session() {
        let h = start(false).await;

        h.shutdown.cancel();
        let summary = h.task.await.unwrap();

        assert_eq!(summary.reason, CloseReason::Shutdown);
        assert!(h.handle.is_closed());
    }

    #[tokio::test]
    async fn test_write_failure_tears_down_session() {
        let h = start(true).await;
        let broadcaster = Broadcaster::new(Arc::clone(&h.registry), ChannelName::mainstream());

        broadcaster.broadcast(Chunk::copy_from_slice(&[9])).await;
        let summary = h.task.await.unwrap();

        assert_eq!(summary.reason, CloseReason::WriteFailed);
        assert_eq!(summary.stats.chunks_sent, 0);
        assert_eq!(h.registry.subscriber_count(&ChannelName::mainstream()).await, 0);
        assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_external_unsubscribe_ends_session() {
        let h = start(false).await;

        assert!(h.registry.unsubscribe(&ChannelName::mainstream(), 1).await);
        let summary = h.task.await.unwrap();

        assert_eq!(summary.reason, CloseReason::Unsubscribed);
        // The session's own unsubscribe was a harmless no-op
        assert_eq!(h.registry.subscriber_count(&ChannelName::mainstream()).await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_session_id_rejected() {
        let h = start(false).await;
        let (tx, _delivered) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        let (_peer_close, peer_rx) = oneshot::channel();

        let duplicate = SubscriberSession::new(
            1,
            ChannelName::mainstream(),
            Arc::clone(&h.registry),
            &h.shutdown,
        );
        let sink = TestSink {
            tx,
            closes: Arc::clone(&closes),
            fail_writes: false,
        };
        let summary = duplicate.run(sink, TestListener(peer_rx)).await;

        assert_eq!(summary.reason, CloseReason::Rejected);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        // The original subscription is untouched
        assert_eq!(h.registry.subscriber_count(&ChannelName::mainstream()).await, 1);
        h.handle.close();
    }
}

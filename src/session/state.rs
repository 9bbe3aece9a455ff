//! Session state machine
//!
//! Tracks the lifecycle of a subscriber session from upgrade to teardown.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::registry::{ChannelName, SessionId};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Upgrade accepted, not yet subscribed
    Connecting,
    /// Subscribed and delivering chunks
    Active,
    /// Teardown in progress
    Closing,
    /// Unsubscribed and connection released
    Closed,
}

/// Why a session left the active phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer sent a close frame, hung up, or the receive side failed
    PeerClosed,
    /// Server-side teardown through a [`SessionHandle`]
    ServerClosed,
    /// Server is shutting down
    Shutdown,
    /// Writing a chunk to the connection failed
    WriteFailed,
    /// The delivery queue was removed from the registry
    Unsubscribed,
    /// The session id was already subscribed on the channel
    Rejected,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CloseReason::PeerClosed => "peer closed",
            CloseReason::ServerClosed => "closed by server",
            CloseReason::Shutdown => "shutdown",
            CloseReason::WriteFailed => "write failed",
            CloseReason::Unsubscribed => "unsubscribed",
            CloseReason::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Closing signal shared by the delivery loop, the peer-close listener and
/// any [`SessionHandle`]
///
/// The first caller of [`close`](Self::close) decides the reason. A cancel of
/// the parent (shutdown) token with no reason recorded reads as
/// [`CloseReason::Shutdown`].
#[derive(Debug)]
pub struct CloseSignal {
    token: CancellationToken,
    reason: OnceLock<CloseReason>,
}

impl CloseSignal {
    /// Create a signal cancelled together with `parent`
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            reason: OnceLock::new(),
        }
    }

    /// Request close
    pub fn close(&self, reason: CloseReason) {
        if !self.token.is_cancelled() {
            let _ = self.reason.set(reason);
        }
        self.token.cancel();
    }

    /// Whether close has been requested
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until close is requested
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// The recorded close reason
    pub fn reason(&self) -> CloseReason {
        self.reason.get().copied().unwrap_or(CloseReason::Shutdown)
    }
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: SessionId,

    /// Channel the session subscribes to
    pub channel: ChannelName,

    /// Current phase
    pub phase: SessionPhase,

    /// Time the upgrade was accepted
    pub connected_at: Instant,

    /// Time the session became active
    pub activated_at: Option<Instant>,

    /// Set when the session starts closing
    pub close_reason: Option<CloseReason>,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: SessionId, channel: ChannelName) -> Self {
        Self {
            id,
            channel,
            phase: SessionPhase::Connecting,
            connected_at: Instant::now(),
            activated_at: None,
            close_reason: None,
        }
    }

    /// Subscription succeeded
    pub fn activate(&mut self) {
        if self.phase == SessionPhase::Connecting {
            self.phase = SessionPhase::Active;
            self.activated_at = Some(Instant::now());
        }
    }

    /// Start tearing down; only the first reason is kept
    pub fn begin_closing(&mut self, reason: CloseReason) {
        if matches!(self.phase, SessionPhase::Connecting | SessionPhase::Active) {
            self.phase = SessionPhase::Closing;
            self.close_reason = Some(reason);
        }
    }

    /// Teardown finished
    pub fn finish(&mut self) {
        if self.phase == SessionPhase::Closing {
            self.phase = SessionPhase::Closed;
        }
    }

    /// Check if session is active
    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    /// Time spent in the active phase so far
    pub fn active_duration(&self) -> Duration {
        self.activated_at
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO)
    }
}

/// Handle for tearing a session down from the server side
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    channel: ChannelName,
    signal: std::sync::Arc<CloseSignal>,
}

impl SessionHandle {
    pub(crate) fn new(
        id: SessionId,
        channel: ChannelName,
        signal: std::sync::Arc<CloseSignal>,
    ) -> Self {
        Self {
            id,
            channel,
            signal,
        }
    }

    /// Session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Channel of the session
    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// Ask the session to close
    pub fn close(&self) {
        self.signal.close(CloseReason::ServerClosed);
    }

    /// Whether the session is closing or closed
    pub fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }
}

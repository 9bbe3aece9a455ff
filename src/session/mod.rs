//! Subscriber session management
//!
//! A session represents one connected consumer of a channel: its bounded
//! delivery queue, its phase, and the delivery loop that writes queued
//! chunks to the connection.

pub mod queue;
pub mod state;
pub mod subscriber;
pub mod table;
pub mod transport;

pub use queue::{delivery_queue, ChunkReceiver, ChunkSender};
pub use state::{CloseReason, CloseSignal, SessionHandle, SessionPhase, SessionState};
pub use subscriber::{SessionSummary, SubscriberSession};
pub use table::SessionTable;
pub use transport::{ChunkSink, PeerListener};

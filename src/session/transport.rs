//! Connection primitives a session needs from its transport
//!
//! The WebSocket adapter in `server::transport` implements these for axum
//! sockets; tests implement them over in-memory channels.

use std::future::Future;

use crate::error::Result;
use crate::registry::Chunk;

/// Outbound half of a subscriber connection
pub trait ChunkSink: Send + 'static {
    /// Write one chunk as a single binary message
    fn send_chunk(&mut self, chunk: Chunk) -> impl Future<Output = Result<()>> + Send;

    /// Close the connection; called exactly once per session
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Inbound half of a subscriber connection
pub trait PeerListener: Send + 'static {
    /// Resolve once the peer is gone
    ///
    /// That is: a close frame arrived, the stream ended, or receiving failed.
    /// Anything else the peer sends is ignored.
    fn closed(self) -> impl Future<Output = ()> + Send;
}

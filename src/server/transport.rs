//! WebSocket connection adapter
//!
//! Splits an upgraded axum socket into the outbound sink and the peer-close
//! listener a subscriber session runs on.

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use crate::error::Result;
use crate::registry::Chunk;
use crate::session::{ChunkSink, PeerListener};

/// Split an upgraded socket into its session halves
pub fn split(socket: WebSocket) -> (WsSink, WsListener) {
    let (sink, stream) = socket.split();
    (WsSink { sink }, WsListener { stream })
}

/// Outbound half: one binary message per chunk
pub struct WsSink {
    sink: SplitSink<WebSocket, Message>,
}

impl ChunkSink for WsSink {
    async fn send_chunk(&mut self, chunk: Chunk) -> Result<()> {
        self.sink.send(Message::Binary(chunk.into_bytes())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await?;
        Ok(())
    }
}

/// Inbound half: waits for the peer to go away
///
/// Reading also lets the socket answer pings while the session is active.
pub struct WsListener {
    stream: SplitStream<WebSocket>,
}

impl PeerListener for WsListener {
    async fn closed(mut self) {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Close(frame)) => {
                    tracing::debug!(frame = ?frame, "Peer sent close frame");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "Peer receive failed");
                    return;
                }
            }
        }
    }
}

//! HTTP routes
//!
//! One `GET /<channel>` route per configured channel; each accepts a
//! WebSocket upgrade and runs a subscriber session on the upgraded socket.
//! A channel whose source has ended answers `410 Gone`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::registry::{ChannelName, ChannelRegistry};
use crate::session::{SessionTable, SubscriberSession};

use super::transport;

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState {
    registry: Arc<ChannelRegistry>,
    sessions: Arc<SessionTable>,
    shutdown: CancellationToken,
    next_session_id: Arc<AtomicU64>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl AppState {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        sessions: Arc<SessionTable>,
        shutdown: CancellationToken,
        max_connections: usize,
    ) -> Self {
        let connection_semaphore = if max_connections > 0 {
            Some(Arc::new(Semaphore::new(max_connections)))
        } else {
            None
        };

        Self {
            registry,
            sessions,
            shutdown,
            next_session_id: Arc::new(AtomicU64::new(1)),
            connection_semaphore,
        }
    }

    /// Reserve a connection slot; `None` inside `Ok` means unlimited
    fn acquire_connection(&self) -> Result<Option<OwnedSemaphorePermit>, ()> {
        match self.connection_semaphore {
            Some(ref sem) => sem.clone().try_acquire_owned().map(Some).map_err(|_| ()),
            None => Ok(None),
        }
    }
}

/// Build the router with one stream route per channel
pub fn build_router(state: AppState, channels: &[ChannelName]) -> Router {
    let mut router = Router::new();

    for channel in channels {
        let path = format!("/{}", channel);
        let channel = channel.clone();
        router = router.route(
            &path,
            get(move |ws: WebSocketUpgrade, State(state): State<AppState>| {
                stream_handler(ws, state, channel)
            }),
        );
    }

    router.with_state(state)
}

async fn stream_handler(ws: WebSocketUpgrade, state: AppState, channel: ChannelName) -> Response {
    if state.sessions.is_ended(&channel).await {
        tracing::debug!(channel = %channel, "Connection rejected: channel ended");
        return StatusCode::GONE.into_response();
    }

    let Ok(permit) = state.acquire_connection() else {
        tracing::warn!(channel = %channel, "Connection rejected: limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let session_id = state.next_session_id.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(channel = %channel, session_id = session_id, "Upgrade requested");

    ws.on_failed_upgrade(move |e| {
        tracing::warn!(session_id = session_id, error = %e, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| async move {
        let _permit = permit;

        let session = SubscriberSession::new(
            session_id,
            channel,
            Arc::clone(&state.registry),
            &state.shutdown,
        );
        let handle = session.handle();
        if !state.sessions.insert(handle.clone()).await {
            // Channel ended during the upgrade
            handle.close();
        }

        let (sink, listener) = transport::split(socket);
        session.run(sink, listener).await;
        state.sessions.remove(session_id).await;
    })
}

//! Relay server
//!
//! Owns the channel registry, spawns one source reader per channel and
//! serves the WebSocket routes until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigError, Error, Result};
use crate::registry::{ChannelName, ChannelRegistry};
use crate::server::config::ServerConfig;
use crate::server::routes::{build_router, AppState};
use crate::session::SessionTable;
use crate::source::{ChunkSource, SourceReader};

/// Live stream relay server
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<ChannelRegistry>,
    sessions: Arc<SessionTable>,
    shutdown: CancellationToken,
    channels: Vec<ChannelName>,
    readers: Vec<(ChannelName, BoxFuture<'static, ()>)>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(ChannelRegistry::with_config(config.registry.clone()));

        Self {
            config,
            registry,
            sessions: Arc::new(SessionTable::new()),
            shutdown: CancellationToken::new(),
            channels: Vec::new(),
            readers: Vec::new(),
        }
    }

    /// Add a channel fed by `source`, served at `/<name>`
    pub fn channel<S: ChunkSource>(mut self, name: ChannelName, source: S) -> Result<Self> {
        if !name.is_routable() || self.channels.contains(&name) {
            return Err(ConfigError::InvalidChannelName(name.as_str().to_string()).into());
        }

        let reader = SourceReader::new(
            source,
            Arc::clone(&self.registry),
            name.clone(),
            self.config.reader.clone(),
        );
        let run = Box::pin(reader.run(self.shutdown.clone()));
        self.readers.push((name.clone(), run));
        self.channels.push(name);

        Ok(self)
    }

    /// Get a reference to the channel registry
    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Live sessions across all channels
    pub fn sessions(&self) -> &Arc<SessionTable> {
        &self.sessions
    }

    /// Token that stops the server, its readers and its sessions when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Configured channels
    pub fn channels(&self) -> &[ChannelName] {
        &self.channels
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server until the process is interrupted
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            addr = %local_addr,
            channels = ?self.channels,
            "Relay server listening"
        );

        let token = self.shutdown.clone();
        let reader_handles: Vec<_> = self
            .readers
            .into_iter()
            .map(|(channel, reader)| {
                let sessions = Arc::clone(&self.sessions);
                let token = token.clone();
                tokio::spawn(async move {
                    reader.await;
                    // A reader only returns early when its source is exhausted
                    if !token.is_cancelled() {
                        sessions.end_channel(&channel).await;
                    }
                })
            })
            .collect();

        let state = AppState::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.sessions),
            token.clone(),
            self.config.max_connections,
        );
        let router = build_router(state, &self.channels);

        let signal_token = token.clone();
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown => {}
                    _ = signal_token.cancelled() => {}
                }
                tracing::info!("Shutdown signal received");
                // Upgraded sockets are not tracked by graceful shutdown;
                // sessions stop through the token instead
                signal_token.cancel();
            })
            .await;

        token.cancel();
        for handle in reader_handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Source reader task failed");
            }
        }

        let sessions = self.sessions.session_count().await;
        tracing::info!(
            sessions,
            "Relay server stopped"
        );
        result.map_err(Error::from)
    }
}

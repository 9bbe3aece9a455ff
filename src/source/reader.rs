//! Source reader loop
//!
//! One reader task per channel pulls bytes from the channel's source and
//! hands each read to the channel's broadcaster. Reads only happen while the
//! channel has subscribers; a read in flight is abandoned as soon as the last
//! subscriber leaves, leaving the unread data in the source.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::registry::{Broadcaster, ChannelEntry, ChannelName, ChannelRegistry, Chunk};

use super::backoff::Backoff;
use super::input::ChunkSource;

/// Default maximum chunk size (1 MiB)
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Largest accepted chunk size (16 MiB)
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Default interval for re-checking the subscriber count
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Shortest accepted poll interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Source reader configuration
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Upper bound on the bytes taken by a single read
    pub max_chunk_size: usize,

    /// Fallback re-check interval while waiting for subscribers
    pub poll_interval: Duration,

    /// First delay after an open/read failure
    pub retry_initial_delay: Duration,

    /// Cap for the failure delay
    pub retry_max_delay: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_initial_delay: Duration::from_millis(250),
            retry_max_delay: Duration::from_secs(8),
        }
    }
}

impl ReaderConfig {
    /// Set the maximum chunk size, clamped to `1..=MAX_CHUNK_SIZE`
    pub fn max_chunk_size(mut self, size: usize) -> Self {
        self.max_chunk_size = size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    /// Set the subscriber poll interval (at least [`MIN_POLL_INTERVAL`])
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Set the failure backoff bounds
    pub fn retry_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.retry_initial_delay = initial;
        self.retry_max_delay = max;
        self
    }
}

/// Reads one channel's source and feeds its broadcaster
pub struct SourceReader<S: ChunkSource> {
    source: S,
    registry: Arc<ChannelRegistry>,
    broadcaster: Broadcaster,
    config: ReaderConfig,
    backoff: Backoff,
    buf: Vec<u8>,
}

impl<S: ChunkSource> SourceReader<S> {
    pub fn new(
        source: S,
        registry: Arc<ChannelRegistry>,
        channel: ChannelName,
        config: ReaderConfig,
    ) -> Self {
        let broadcaster = Broadcaster::new(Arc::clone(&registry), channel);
        let backoff = Backoff::new(config.retry_initial_delay, config.retry_max_delay);

        Self {
            source,
            registry,
            broadcaster,
            buf: vec![0; config.max_chunk_size.clamp(1, MAX_CHUNK_SIZE)],
            config,
            backoff,
        }
    }

    /// The channel this reader feeds
    pub fn channel(&self) -> &ChannelName {
        self.broadcaster.channel()
    }

    /// Run until `shutdown` is cancelled or a source that cannot be reopened
    /// is exhausted
    pub async fn run(mut self, shutdown: CancellationToken) {
        let channel = self.channel().clone();
        let entry = self.registry.channel(&channel).await;
        let poll_interval = self.config.poll_interval.max(MIN_POLL_INTERVAL);
        let mut reader: Option<S::Reader> = None;

        tracing::info!(
            channel = %channel,
            source = %self.source.describe(),
            "Source reader started"
        );

        loop {
            if reader.is_none() {
                let opened = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    opened = self.source.open() => opened,
                };

                match opened {
                    Ok(opened) => {
                        entry.counters.record_open();
                        tracing::info!(
                            channel = %channel,
                            source = %self.source.describe(),
                            "Source opened"
                        );
                        reader = Some(opened);
                    }
                    Err(e) => {
                        tracing::warn!(
                            channel = %channel,
                            source = %self.source.describe(),
                            error = %e,
                            "Failed to open source"
                        );
                        if !self.fail(&entry, &shutdown).await {
                            break;
                        }
                        continue;
                    }
                }
            }

            let Some(current) = reader.as_mut() else {
                continue;
            };

            // Nobody listening: leave the data in the source
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.registry.wait_for_subscribers(&channel, poll_interval) => {}
            }

            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.registry.wait_until_idle(&channel, poll_interval) => continue,
                result = current.read(&mut self.buf) => result,
            };

            match result {
                Ok(0) => {
                    tracing::info!(channel = %channel, "Source reached end of stream");
                    reader = None;
                    if !self.source.restartable() {
                        break;
                    }
                    if !self.fail(&entry, &shutdown).await {
                        break;
                    }
                }
                Ok(n) => {
                    self.backoff.reset();
                    let chunk = Chunk::copy_from_slice(&self.buf[..n]);
                    let delivered = self.broadcaster.broadcast(chunk).await;
                    tracing::trace!(
                        channel = %channel,
                        bytes = n,
                        subscribers = delivered,
                        "Chunk broadcast"
                    );
                }
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "Source read failed");
                    reader = None;
                    if !self.source.restartable() {
                        entry.counters.record_failure();
                        break;
                    }
                    if !self.fail(&entry, &shutdown).await {
                        break;
                    }
                }
            }
        }

        if shutdown.is_cancelled() {
            tracing::info!(channel = %channel, "Source reader stopped");
        } else {
            tracing::info!(
                channel = %channel,
                source = %self.source.describe(),
                "Source finished, channel ended"
            );
        }
    }

    async fn fail(&mut self, entry: &ChannelEntry, shutdown: &CancellationToken) -> bool {
        entry.counters.record_failure();
        self.pause(shutdown).await
    }

    /// Sleep for the next backoff delay; `false` if shutdown came first
    async fn pause(&mut self, shutdown: &CancellationToken) -> bool {
        let delay = self.backoff.next_delay();
        tracing::debug!(
            channel = %self.broadcaster.channel(),
            delay_ms = delay.as_millis() as u64,
            "Retrying source after delay"
        );

        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::registry::RegistryConfig;
use crate::source::ReaderConfig;

/// Default listening port
pub const DEFAULT_PORT: u16 = 4558;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent subscriber connections (0 = unlimited)
    pub max_connections: usize,

    /// Source reader settings shared by every channel
    pub reader: ReaderConfig,

    /// Registry settings (per-subscriber queue capacity)
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            reader: ReaderConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the maximum chunk size read from a source
    pub fn max_chunk_size(mut self, size: usize) -> Self {
        self.reader = self.reader.max_chunk_size(size);
        self
    }

    /// Set the per-subscriber queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.registry = self.registry.queue_capacity(capacity);
        self
    }

    /// Set the subscriber poll interval of the source readers
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.reader = self.reader.poll_interval(interval);
        self
    }

    /// Set the source failure backoff bounds
    pub fn retry_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.reader = self.reader.retry_delays(initial, max);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::config::DEFAULT_QUEUE_CAPACITY;
    use crate::source::DEFAULT_MAX_CHUNK_SIZE;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 4558);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.reader.max_chunk_size, DEFAULT_MAX_CHUNK_SIZE);
        assert_eq!(config.registry.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:4600".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 4600);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:4558".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .max_chunk_size(64 * 1024)
            .queue_capacity(4)
            .poll_interval(Duration::from_millis(20))
            .retry_delays(Duration::from_millis(5), Duration::from_millis(50));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.reader.max_chunk_size, 64 * 1024);
        assert_eq!(config.registry.queue_capacity, 4);
        assert_eq!(config.reader.poll_interval, Duration::from_millis(20));
        assert_eq!(config.reader.retry_initial_delay, Duration::from_millis(5));
        assert_eq!(config.reader.retry_max_delay, Duration::from_millis(50));
    }
}

//! Statistics for channels and subscriber sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters for one channel
///
/// Updated by the source reader and broadcaster without locking.
#[derive(Debug)]
pub struct ChannelCounters {
    created_at: Instant,
    chunks_read: AtomicU64,
    bytes_read: AtomicU64,
    read_failures: AtomicU64,
    source_opens: AtomicU64,
    deliveries: AtomicU64,
}

impl ChannelCounters {
    pub fn new() -> Self {
        Self {
            created_at: Instant::now(),
            chunks_read: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
            source_opens: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
        }
    }

    /// Record a chunk handed to the broadcaster and how many queues took it
    pub fn record_chunk(&self, bytes: usize, delivered_to: usize) {
        self.chunks_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered_to as u64, Ordering::Relaxed);
    }

    /// Record a failed open, failed read or end-of-stream
    pub fn record_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful source open
    pub fn record_open(&self) {
        self.source_opens.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot
    pub fn snapshot(&self, subscriber_count: usize) -> ChannelStats {
        ChannelStats {
            subscriber_count,
            chunks_read: self.chunks_read.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            source_opens: self.source_opens.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            uptime: self.created_at.elapsed(),
        }
    }
}

impl Default for ChannelCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Channel statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Number of live subscribers
    pub subscriber_count: usize,
    /// Chunks read from the source and broadcast
    pub chunks_read: u64,
    /// Bytes read from the source
    pub bytes_read: u64,
    /// Failed opens, failed reads and end-of-stream events
    pub read_failures: u64,
    /// Number of times the source was (re)opened
    pub source_opens: u64,
    /// Sum over all chunks of the number of queues each reached
    pub deliveries: u64,
    /// Time since the channel was first referenced
    pub uptime: Duration,
}

impl ChannelStats {
    /// Average read rate in bits per second since the channel was created
    pub fn bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_read * 8) / secs
        } else {
            0
        }
    }
}

/// Per-session statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Chunks written to the connection
    pub chunks_sent: u64,
    /// Bytes written to the connection
    pub bytes_sent: u64,
    /// Chunks discarded because the queue overflowed
    pub chunks_dropped: u64,
    /// Time spent in the active phase
    pub duration: Duration,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a chunk written to the connection
    pub fn record_sent(&mut self, bytes: usize) {
        self.chunks_sent += 1;
        self.bytes_sent += bytes as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_counters_snapshot() {
        let counters = ChannelCounters::new();
        counters.record_open();
        counters.record_chunk(1024, 3);
        counters.record_chunk(512, 2);
        counters.record_failure();

        let stats = counters.snapshot(2);
        assert_eq!(stats.subscriber_count, 2);
        assert_eq!(stats.chunks_read, 2);
        assert_eq!(stats.bytes_read, 1536);
        assert_eq!(stats.deliveries, 5);
        assert_eq!(stats.read_failures, 1);
        assert_eq!(stats.source_opens, 1);
    }

    #[test]
    fn test_channel_bitrate() {
        let stats = ChannelStats {
            bytes_read: 1_000_000,
            uptime: Duration::from_secs(10),
            ..Default::default()
        };

        // 1,000,000 bytes * 8 bits / 10 seconds
        assert_eq!(stats.bitrate(), 800_000);
    }

    #[test]
    fn test_channel_bitrate_zero_uptime() {
        let stats = ChannelStats {
            bytes_read: 1_000_000,
            ..Default::default()
        };
        assert_eq!(stats.bitrate(), 0);
    }

    #[test]
    fn test_session_stats_record_sent() {
        let mut stats = SessionStats::new();
        stats.record_sent(100);
        stats.record_sent(28);

        assert_eq!(stats.chunks_sent, 2);
        assert_eq!(stats.bytes_sent, 128);
        assert_eq!(stats.chunks_dropped, 0);
    }
}

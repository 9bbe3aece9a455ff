//! Registry configuration

/// Default number of chunks a subscriber may have queued before the oldest
/// one is dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Largest accepted per-subscriber queue capacity
pub const MAX_QUEUE_CAPACITY: usize = 4096;

/// Configuration for the channel registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each subscriber's delivery queue (in chunks)
    ///
    /// Always a power of two between 1 and [`MAX_QUEUE_CAPACITY`].
    pub queue_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl RegistryConfig {
    /// Set the per-subscriber queue capacity
    ///
    /// The value is clamped to `1..=MAX_QUEUE_CAPACITY` and rounded up to
    /// the next power of two, the granularity of the underlying queue.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.clamp(1, MAX_QUEUE_CAPACITY).next_power_of_two();
        self
    }
}

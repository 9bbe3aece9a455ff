//! Channel and chunk types for stream routing
//!
//! This module defines the key type for identifying channels and the chunks
//! that are broadcast to subscribers.

use bytes::Bytes;

/// Unique identifier for a subscriber session
pub type SessionId = u64;

/// Name of a logical channel (e.g. "mainstream")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelName(String);

impl ChannelName {
    /// Default name of the primary stream
    pub const MAINSTREAM: &'static str = "mainstream";
    /// Default name of the secondary stream
    pub const SUBSTREAM: &'static str = "substream";

    /// Create a new channel name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The primary stream channel
    pub fn mainstream() -> Self {
        Self::new(Self::MAINSTREAM)
    }

    /// The secondary stream channel
    pub fn substream() -> Self {
        Self::new(Self::SUBSTREAM)
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name can be served as a single URL path segment
    pub fn is_routable(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    }
}

impl std::fmt::Display for ChannelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One read's worth of bytes from a channel's source
///
/// Cheap to clone: `Bytes` is reference counted, so every subscriber queue
/// shares the same allocation and none of them can mutate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    data: Bytes,
}

impl Chunk {
    /// Wrap already-owned bytes
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Copy the filled part of a read buffer into a new chunk
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Number of bytes in the chunk
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the chunk carries no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the chunk contents
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Take the underlying bytes
    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl AsRef<[u8]> for Chunk {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

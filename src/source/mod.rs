//! Producer side of a channel
//!
//! A [`ChunkSource`] opens the external producer (normally a named pipe) and
//! a [`SourceReader`] turns its bytes into chunks for the channel's
//! broadcaster, throttled by the channel's subscriber count.

pub mod backoff;
pub mod input;
pub mod reader;

pub use backoff::Backoff;
pub use input::{ChunkSource, OnceSource, PipeReader, PipeSource};
pub use reader::{
    ReaderConfig, SourceReader, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_POLL_INTERVAL, MAX_CHUNK_SIZE,
    MIN_POLL_INTERVAL,
};

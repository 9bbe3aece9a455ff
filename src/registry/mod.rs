//! Channel registry for pub/sub routing
//!
//! The registry tracks every channel and the delivery queues of the sessions
//! subscribed to it. A [`Broadcaster`] pushes chunks read from a channel's
//! source into each of those queues.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<ChannelRegistry>
//!                     ┌──────────────────────────┐
//!                     │ channels: HashMap<Name,  │
//!                     │   ChannelEntry {         │
//!                     │     subscribers: {       │
//!                     │       id => ChunkSender  │
//!                     │     },                   │
//!                     │   }                      │
//!                     │ >                        │
//!                     └────────────┬─────────────┘
//!                                  │
//!          ┌───────────────────────┼───────────────────────┐
//!          │                       │                       │
//!          ▼                       ▼                       ▼
//!   [SourceReader]           [Session 1]             [Session 2]
//!   read(pipe)               queue.recv()            queue.recv()
//!          │                       │                       │
//!          └──► broadcaster.broadcast() ──► ws.send() ──► TCP
//! ```
//!
//! # Zero-Copy Design
//!
//! `bytes::Bytes` uses reference counting, so all subscribers share the same
//! memory allocation. Each delivery queue holds a clone of the `Chunk`, but
//! the inner `Bytes` data is only reference-counted, not copied.

pub mod broadcaster;
pub mod chunk;
pub mod config;
pub mod entry;
pub mod store;

pub use broadcaster::Broadcaster;
pub use chunk::{ChannelName, Chunk, SessionId};
pub use config::RegistryConfig;
pub use entry::ChannelEntry;
pub use store::ChannelRegistry;

//! # pipecast
//!
//! Live byte-stream relay. Each channel reads raw bytes (typically encoded
//! video) from one producer, usually a named pipe, and fans every read out
//! to all WebSocket viewers of that channel.
//!
//! - Reads only happen while a channel has viewers; with nobody listening
//!   the data stays in the pipe.
//! - Every viewer has a small bounded queue. A slow viewer loses its oldest
//!   queued chunks instead of slowing down the source or other viewers.
//! - Each chunk goes out as one binary WebSocket message holding exactly the
//!   bytes of one source read.
//!
//! ## Example
//!
//! ```no_run
//! use pipecast::{ChannelName, PipeSource, RelayServer, ServerConfig};
//!
//! # async fn example() -> pipecast::Result<()> {
//! let server = RelayServer::new(ServerConfig::default())
//!     .channel(ChannelName::mainstream(), PipeSource::new("/tmp/main.pipe"))?
//!     .channel(ChannelName::substream(), PipeSource::new("/tmp/sub.pipe"))?;
//!
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod registry;
pub mod server;
pub mod session;
pub mod source;
pub mod stats;

pub use error::{ConfigError, Error, Result};
pub use registry::{Broadcaster, ChannelName, ChannelRegistry, Chunk, RegistryConfig, SessionId};
pub use server::{RelayServer, ServerConfig};
pub use session::{CloseReason, SessionHandle, SessionPhase, SessionTable, SubscriberSession};
pub use source::{ChunkSource, OnceSource, PipeReader, PipeSource, ReaderConfig, SourceReader};

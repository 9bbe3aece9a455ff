//! Error types
//!
//! One crate-wide error with a dedicated variant for startup configuration
//! problems, which the binary maps to process exit codes.

use std::path::PathBuf;

/// Exit code for malformed command-line arguments
pub const USAGE_EXIT_CODE: i32 = 4;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure (source open/read, socket configuration)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid startup configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failed to bind the listening socket
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Outbound write or close on a subscriber connection failed
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Process exit code for this error when it ends the binary
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(e) => e.exit_code(),
            _ => 3,
        }
    }
}

impl From<axum::Error> for Error {
    fn from(e: axum::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

/// Startup configuration error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Neither a mainstream nor a substream source was supplied
    #[error("no stream source configured: pass at least one of -m or -s")]
    NoChannels,

    /// A supplied source path does not exist
    #[error("invalid path for -{flag}: {}", path.display())]
    InvalidPath { flag: char, path: PathBuf },

    /// A channel name that cannot be routed
    #[error("invalid channel name: {0:?}")]
    InvalidChannelName(String),
}

impl ConfigError {
    /// Exit code reported to the operator
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::NoChannels => 1,
            ConfigError::InvalidPath { .. } => 2,
            ConfigError::InvalidChannelName(_) => 2,
        }
    }
}

//! Relay server
//!
//! WebSocket front end of the relay: configuration, routes, the connection
//! adapter, and the server that wires channels to their source readers.

pub mod config;
pub mod listener;
pub mod routes;
pub mod transport;

pub use config::{ServerConfig, DEFAULT_PORT};
pub use listener::RelayServer;
pub use routes::{build_router, AppState};

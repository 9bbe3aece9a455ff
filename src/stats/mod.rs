//! Statistics for channels and subscriber sessions

pub mod metrics;

pub use metrics::{ChannelCounters, ChannelStats, SessionStats};

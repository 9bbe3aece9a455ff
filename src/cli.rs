//! Command-line interface

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::builder::RangedU64ValueParser;
use clap::Parser;

use crate::error::{ConfigError, USAGE_EXIT_CODE};
use crate::registry::config::{DEFAULT_QUEUE_CAPACITY, MAX_QUEUE_CAPACITY};
use crate::registry::ChannelName;
use crate::server::{ServerConfig, DEFAULT_PORT};
use crate::source::{DEFAULT_MAX_CHUNK_SIZE, MAX_CHUNK_SIZE};

/// Relay named pipes to WebSocket viewers
#[derive(Debug, Clone, Parser)]
#[command(name = "pipecast", version, about)]
pub struct Cli {
    /// Named pipe feeding the /mainstream channel
    #[arg(short = 'm', long = "mainstream", value_name = "PATH")]
    pub mainstream: Option<PathBuf>,

    /// Named pipe feeding the /substream channel
    #[arg(short = 's', long = "substream", value_name = "PATH")]
    pub substream: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum bytes taken from a pipe per read (one WebSocket message)
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_CHUNK_SIZE,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_CHUNK_SIZE as u64)
    )]
    pub chunk_size: usize,

    /// Chunks a viewer may have queued before the oldest is dropped,
    /// rounded up to a power of two
    #[arg(
        long,
        default_value_t = DEFAULT_QUEUE_CAPACITY,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_QUEUE_CAPACITY as u64)
    )]
    pub queue_capacity: usize,

    /// Re-check interval while a channel has no viewers, in milliseconds
    #[arg(
        long,
        default_value_t = 250,
        value_parser = clap::value_parser!(u64).range(1..=60_000)
    )]
    pub poll_interval_ms: u64,

    /// Maximum concurrent viewers across all channels (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    pub max_connections: usize,
}

/// Exit code for a failed argument parse
///
/// `None` for `--help` and `--version`, which clap prints and exits on
/// itself.
pub fn parse_error_exit_code(err: &clap::Error) -> Option<i32> {
    if err.use_stderr() {
        Some(USAGE_EXIT_CODE)
    } else {
        None
    }
}

impl Cli {
    /// Validated channel sources, mainstream first
    pub fn channel_paths(&self) -> Result<Vec<(ChannelName, PathBuf)>, ConfigError> {
        let supplied = [
            ('m', ChannelName::mainstream(), &self.mainstream),
            ('s', ChannelName::substream(), &self.substream),
        ];

        let mut channels = Vec::new();
        for (flag, channel, path) in supplied {
            let Some(path) = path else {
                continue;
            };
            if std::fs::metadata(path).is_err() {
                return Err(ConfigError::InvalidPath {
                    flag,
                    path: path.clone(),
                });
            }
            channels.push((channel, path.clone()));
        }

        if channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }

        Ok(channels)
    }

    /// Server configuration from the flags
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::with_addr(SocketAddr::new(self.bind, self.port))
            .max_connections(self.max_connections)
            .max_chunk_size(self.chunk_size)
            .queue_capacity(self.queue_capacity)
            .poll_interval(Duration::from_millis(self.poll_interval_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pipecast").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        let config = cli.server_config();

        assert_eq!(config.bind_addr.port(), 4558);
        assert_eq!(config.reader.max_chunk_size, 1024 * 1024);
        assert_eq!(config.reader.poll_interval, Duration::from_millis(250));
        assert_eq!(config.registry.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_no_channels() {
        let cli = parse(&[]);
        assert_eq!(cli.channel_paths(), Err(ConfigError::NoChannels));
        assert_eq!(cli.channel_paths().unwrap_err().exit_code(), 1);
    }

    #[test]
    fn test_invalid_path() {
        let cli = parse(&["-s", "/definitely/not/here.pipe"]);
        let err = cli.channel_paths().unwrap_err();

        assert_eq!(
            err,
            ConfigError::InvalidPath {
                flag: 's',
                path: PathBuf::from("/definitely/not/here.pipe"),
            }
        );
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_valid_paths() {
        let main = tempfile::NamedTempFile::new().unwrap();
        let sub = tempfile::NamedTempFile::new().unwrap();
        let cli = parse(&[
            "-m",
            main.path().to_str().unwrap(),
            "-s",
            sub.path().to_str().unwrap(),
        ]);

        let channels = cli.channel_paths().unwrap();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].0, ChannelName::mainstream());
        assert_eq!(channels[0].1, main.path());
        assert_eq!(channels[1].0, ChannelName::substream());
    }

    #[test]
    fn test_one_valid_one_invalid() {
        let main = tempfile::NamedTempFile::new().unwrap();
        let cli = parse(&["-m", main.path().to_str().unwrap(), "-s", "/nope"]);

        assert_eq!(cli.channel_paths().unwrap_err().exit_code(), 2);
    }

    #[test]
    fn test_usage_error_has_own_exit_code() {
        let err = Cli::try_parse_from(["pipecast", "-m"]).unwrap_err();
        let code = parse_error_exit_code(&err).unwrap();

        assert_eq!(code, 4);
        assert_ne!(code, ConfigError::NoChannels.exit_code());
        assert_ne!(
            code,
            ConfigError::InvalidPath {
                flag: 'm',
                path: PathBuf::from("/nope"),
            }
            .exit_code()
        );
    }

    #[test]
    fn test_help_is_not_a_failure() {
        let err = Cli::try_parse_from(["pipecast", "--help"]).unwrap_err();
        assert_eq!(parse_error_exit_code(&err), None);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        for args in [
            ["pipecast", "--chunk-size", "0"],
            ["pipecast", "--chunk-size", "18446744073709551615"],
            ["pipecast", "--poll-interval-ms", "0"],
            ["pipecast", "--queue-capacity", "0"],
            ["pipecast", "--queue-capacity", "100000"],
        ] {
            let err = Cli::try_parse_from(args).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation, "{:?}", args);
        }
    }

    #[test]
    fn test_overrides() {
        let cli = parse(&[
            "--bind",
            "127.0.0.1",
            "-p",
            "9000",
            "--chunk-size",
            "4096",
            "--queue-capacity",
            "3",
            "--poll-interval-ms",
            "50",
            "--max-connections",
            "10",
        ]);
        let config = cli.server_config();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.reader.max_chunk_size, 4096);
        assert_eq!(config.registry.queue_capacity, 4);
        assert_eq!(config.reader.poll_interval, Duration::from_millis(50));
        assert_eq!(config.max_connections, 10);
    }
}

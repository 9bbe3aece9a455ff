use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use pipecast::cli::{parse_error_exit_code, Cli};
use pipecast::{ChannelName, PipeSource, RelayServer, ServerConfig};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match parse_error_exit_code(&e) {
            Some(code) => {
                let _ = e.print();
                return exit_code(code);
            }
            None => e.exit(),
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pipecast=info")),
        )
        .init();

    let channels = match cli.channel_paths() {
        Ok(channels) => channels,
        Err(e) => {
            eprintln!("error: {}", e);
            return exit_code(e.exit_code());
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to start runtime: {}", e);
            return exit_code(3);
        }
    };

    let result = runtime.block_on(run(cli.server_config(), channels));

    // A pipe open still waiting for its writer would otherwise hold the
    // runtime open forever
    runtime.shutdown_timeout(Duration::from_secs(1));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Relay server failed");
            exit_code(e.exit_code())
        }
    }
}

async fn run(config: ServerConfig, channels: Vec<(ChannelName, PathBuf)>) -> pipecast::Result<()> {
    let mut server = RelayServer::new(config);
    for (name, path) in channels {
        tracing::info!(channel = %name, path = %path.display(), "Channel configured");
        server = server.channel(name, PipeSource::new(path))?;
    }

    server.run_until(shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

//! socket-mux daemon.
//!
//! Serves the reply routes declared in a TOML file over a Unix socket.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────┐
//!                          │                  SOCKET-MUX                  │
//!                          │                                              │
//!     Client line          │  ┌──────────┐    ┌──────────┐    ┌─────────┐ │
//!     ─────────────────────┼─▶│   net    │───▶│ routing  │───▶│ handler │ │
//!                          │  │ listener │    │ ServeMux │    │ (reply) │ │
//!                          │  └──────────┘    └──────────┘    └────┬────┘ │
//!     Reply                │                                       │      │
//!     ◀────────────────────┼───────────────────────────────────────┘      │
//!                          │                                              │
//!                          │  ┌────────────────────────────────────────┐  │
//!                          │  │         Cross-Cutting Concerns         │  │
//!                          │  │  config · observability · lifecycle    │  │
//!                          │  └────────────────────────────────────────┘  │
//!                          └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use socket_mux::config::validation::validate_config;
use socket_mux::config::{load_config, ConfigError, MuxConfig};
use socket_mux::lifecycle::{signals, startup, Shutdown};
use socket_mux::observability::{logging, metrics};
use socket_mux::{ListenerError, ServeMux};

#[derive(Parser, Debug)]
#[command(name = "socket-mux")]
#[command(about = "Pattern-routed replies over a line-oriented Unix socket", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Socket path, overriding listener.socket_path
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Log filter, overriding observability.log_level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => MuxConfig::default(),
    };
    if let Some(socket) = cli.socket {
        config.listener.socket_path = socket.to_string_lossy().into_owned();
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "socket-mux starting");

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let mux = ServeMux::from_config(&config)?;
    tracing::info!(
        socket_path = %config.listener.socket_path,
        routes = mux.rule_count(),
        buffer_size = mux.buffer_size(),
        "Configuration loaded"
    );

    let socket_path = PathBuf::from(&config.listener.socket_path);
    startup::prepare_socket_path(&socket_path, config.listener.remove_stale_socket)?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    let served = match mux.listen_and_serve(&shutdown, &socket_path).await {
        Err(e @ ListenerError::Bind { .. }) => return Err(e.into()),
        other => other,
    };

    let drain_timeout = Duration::from_secs(config.listener.drain_timeout_secs);
    if !mux.connections().wait_for_drain_timeout(drain_timeout).await {
        tracing::warn!(
            remaining = mux.connections().active_count(),
            "Drain timed out, abandoning in-flight connections"
        );
    }
    startup::cleanup_socket_path(&socket_path);

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}

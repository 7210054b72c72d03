//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::routing::router::DEFAULT_BUFFER_SIZE;

/// Root configuration for the socket multiplexer daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MuxConfig {
    /// Listener configuration (socket path, read size, drain).
    pub listener: ListenerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Reply routes served by the daemon, tried in order.
    pub routes: Vec<RouteConfig>,

    /// Reply sent when no route matches. Unset closes the connection silently.
    pub default_reply: Option<String>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Filesystem path of the Unix socket.
    pub socket_path: String,

    /// Bytes requested by the single read of each command line.
    pub buffer_size: usize,

    /// Seconds to wait for in-flight handlers after shutdown.
    pub drain_timeout_secs: u64,

    /// Remove a leftover socket file if nothing is listening on it.
    pub remove_stale_socket: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            socket_path: "/tmp/socket-mux.sock".to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            drain_timeout_secs: 5,
            remove_stale_socket: true,
        }
    }
}

/// A pattern route answered with a rendered reply template.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging.
    pub name: String,

    /// Regular expression matched anywhere in the line.
    pub pattern: String,

    /// Reply template; `$name` and `${name}` expand to captures.
    pub reply: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (e.g., "info", "socket_mux=debug").
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable Prometheus metrics.
    pub metrics_enabled: bool,

    /// Metrics endpoint address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `socket_mux_connections_accepted_total` (counter): accepted connections
//! - `socket_mux_dispatch_total` (counter): dispatch outcomes by `outcome`
//!   label (`matched`, `default`, `dropped`)
//! - `socket_mux_active_connections` (gauge): connections whose worker is
//!   still running
//!
//! # Design Decisions
//! - Updates go through the `metrics` facade and are no-ops until a recorder
//!   is installed
//! - The Prometheus exporter is opt-in and installed by the binary

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const CONNECTIONS_ACCEPTED: &str = "socket_mux_connections_accepted_total";
pub const DISPATCH_TOTAL: &str = "socket_mux_dispatch_total";
pub const ACTIVE_CONNECTIONS: &str = "socket_mux_active_connections";

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_accept() {
    ::metrics::counter!(CONNECTIONS_ACCEPTED).increment(1);
}

pub fn record_dispatch(outcome: &'static str) {
    ::metrics::counter!(DISPATCH_TOTAL, "outcome" => outcome).increment(1);
}

pub fn set_active_connections(active: u64) {
    ::metrics::gauge!(ACTIVE_CONNECTIONS).set(active as f64);
}

//! Metrics collection and export for observability
//!
//! Metrics are recorded through the `metrics` facade. Without an installed
//! recorder every call is a no-op; `install_prometheus` wires up an HTTP
//! scrape endpoint.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;
use thiserror::Error;

pub const TXN_EXECUTED: &str = "txn.executed";
pub const TXN_REJECTED: &str = "txn.rejected";
pub const TXN_OPERATIONS: &str = "txn.operations";
pub const TXN_DURATION_MS: &str = "txn.duration_ms";
pub const SYNC_SENT: &str = "sync.sent";
pub const SYNC_RECEIVED: &str = "sync.received";
pub const STORE_VERSIONS: &str = "store.versions";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to install Prometheus exporter: {0}")]
    InstallFailed(String),
}

/// Initialize metrics with descriptions
pub fn init_metrics() {
    describe_counter!(TXN_EXECUTED, "Transactions committed to the local store");
    describe_counter!(TXN_REJECTED, "Transactions rejected as malformed");
    describe_counter!(TXN_OPERATIONS, "Read and write operations executed");
    describe_histogram!(TXN_DURATION_MS, "Transaction execution duration in milliseconds");
    describe_counter!(SYNC_SENT, "Snapshot sync messages sent to peers");
    describe_counter!(SYNC_RECEIVED, "Snapshot sync messages applied from peers");
    describe_gauge!(STORE_VERSIONS, "Number of snapshots held in the versioned store");
}

/// Install a Prometheus recorder serving `/metrics` on `bind_address`
///
/// Must be called from within a tokio runtime.
pub fn install_prometheus(bind_address: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(bind_address)
        .install()
        .map_err(|e| MetricsError::InstallFailed(e.to_string()))?;

    init_metrics();
    Ok(())
}

pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

pub fn record_gauge(name: &'static str, value: f64) {
    gauge!(name).set(value);
}

pub fn record_histogram(name: &'static str, value: f64) {
    histogram!(name).record(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration in milliseconds
    pub fn stop(self) {
        record_histogram(self.name, self.start.elapsed().as_secs_f64() * 1000.0);
    }
}

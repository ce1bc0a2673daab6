//! Metrics collection and exposition.
//!
//! # Metrics
//! - `staking_operations_total` (counter): operation transitions by kind, status
//! - `staking_refresh_total` (counter): balance refreshes by result
//! - `staking_refresh_duration_seconds` (histogram): read-set latency
//! - `staking_balance` (gauge): last adopted balances by field, in whole units
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::engine::amount::to_f64_lossy;
use crate::engine::balance::BalanceSnapshot;
use crate::engine::operation::{OperationKind, OperationStatus};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Count an operation reaching `status`.
pub fn record_operation(kind: OperationKind, status: OperationStatus) {
    counter!(
        "staking_operations_total",
        "kind" => kind.as_str(),
        "status" => status.as_str()
    )
    .increment(1);
}

/// Count a finished balance read set and its latency.
pub fn record_refresh(success: bool, started: Instant) {
    let result = if success { "ok" } else { "error" };
    counter!("staking_refresh_total", "result" => result).increment(1);
    histogram!("staking_refresh_duration_seconds").record(started.elapsed().as_secs_f64());
}

/// Export the adopted snapshot as gauges.
pub fn record_snapshot(snapshot: &BalanceSnapshot, decimals: u8) {
    gauge!("staking_balance", "field" => "native").set(to_f64_lossy(snapshot.native_balance, decimals));
    gauge!("staking_balance", "field" => "staked").set(to_f64_lossy(snapshot.staked_balance, decimals));
    gauge!("staking_balance", "field" => "pending_rewards")
        .set(to_f64_lossy(snapshot.pending_rewards, decimals));
}

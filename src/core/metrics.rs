// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, TextEncoder, register_counter, register_counter_vec,
    register_gauge, register_histogram,
};

lazy_static! {
    // --- Server-wide Gauges ---
    /// The number of clients currently connected to the server.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("spinelkv_connected_clients", "Number of currently connected clients.").unwrap();

    // --- Server-wide Counters ---
    /// The total number of commands processed by the server since startup.
    pub static ref COMMANDS_PROCESSED_TOTAL: Counter =
        register_counter!("spinelkv_commands_processed_total", "Total number of commands processed.").unwrap();
    /// The total number of connections accepted by the server since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("spinelkv_connections_received_total", "Total number of connections received.").unwrap();
    /// Commands whose execution took at least `slow_time`.
    pub static ref SLOW_QUERIES_TOTAL: Counter =
        register_counter!("spinelkv_slow_queries_total", "Total number of commands slower than the slow_time threshold.").unwrap();
    /// Connections closed because of a malformed request.
    pub static ref PROTOCOL_ERRORS_TOTAL: Counter =
        register_counter!("spinelkv_protocol_errors_total", "Total number of connections closed on a protocol error.").unwrap();

    // --- Transaction metrics ---
    /// PREPARE outcomes, labeled `ok`, `watch_changed` or `lock_fail`.
    pub static ref TX_PREPARE_TOTAL: CounterVec =
        register_counter_vec!("spinelkv_tx_prepare_total", "Total number of PREPARE calls, labeled by result.", &["result"]).unwrap();
    /// Prepare locks released by the watchdog instead of EXEC or DISCARD.
    pub static ref TX_WATCHDOG_EXPIRED_TOTAL: Counter =
        register_counter!("spinelkv_tx_watchdog_expired_total", "Total number of prepare locks released by the watchdog.").unwrap();
    pub static ref TX_IN_FLIGHT: Gauge =
        register_gauge!("spinelkv_tx_in_flight", "Number of transactions between MULTI and EXEC or DISCARD.").unwrap();
    /// Refreshed on scrape.
    pub static ref TX_TRACKED_KEYS: Gauge =
        register_gauge!("spinelkv_tx_tracked_keys", "Number of keys registered in the transaction locker.").unwrap();

    // --- Histograms ---
    /// A histogram of command execution latencies.
    pub static ref COMMAND_LATENCY_SECONDS: Histogram =
        register_histogram!("spinelkv_command_latency_seconds", "Latency of command processing in seconds.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}

//! Prometheus metrics for the trading cycle.
//!
//! This module provides metrics for:
//! - Order-creation attempts (started, dropped while busy, failed)
//! - Order-creation attempt latency
//! - Orders placed and retracted per venue
//! - Centralized orders placed for OpenDEX fills
//! - Cleanup runs

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::debug;

// === Metric Name Constants ===

/// Trade info updates produced by the cycle.
pub const METRIC_TRADE_INFO_UPDATES: &str = "trade_info_updates_total";
/// Order-creation attempts started.
pub const METRIC_ATTEMPTS_STARTED: &str = "order_attempts_started_total";
/// Trade info updates ignored because an attempt was in flight.
pub const METRIC_ATTEMPTS_DROPPED: &str = "order_attempts_dropped_total";
/// Order-creation attempts that failed.
pub const METRIC_ATTEMPTS_FAILED: &str = "order_attempts_failed_total";
/// Order-creation attempt latency.
pub const METRIC_ATTEMPT_LATENCY: &str = "order_attempt_latency_ms";
/// OpenDEX orders placed.
pub const METRIC_ORDERS_PLACED: &str = "opendex_orders_placed_total";
/// Orders below the minimum size that were skipped.
pub const METRIC_ORDERS_SKIPPED: &str = "opendex_orders_skipped_total";
/// Orders retracted, labelled by venue.
pub const METRIC_ORDERS_RETRACTED: &str = "orders_retracted_total";
/// OpenDEX fills received.
pub const METRIC_FILLS: &str = "opendex_fills_total";
/// Centralized orders placed for OpenDEX fills.
pub const METRIC_HEDGES_PLACED: &str = "centralized_orders_placed_total";
/// Cleanup runs.
pub const METRIC_CLEANUP_RUNS: &str = "cleanup_runs_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    describe_counter!(
        METRIC_TRADE_INFO_UPDATES,
        "Total number of combined balance/price updates"
    );
    describe_counter!(
        METRIC_ATTEMPTS_STARTED,
        "Total number of order-creation attempts started"
    );
    describe_counter!(
        METRIC_ATTEMPTS_DROPPED,
        "Total number of updates ignored while an attempt was in flight"
    );
    describe_counter!(
        METRIC_ATTEMPTS_FAILED,
        "Total number of order-creation attempts that failed"
    );
    describe_histogram!(
        METRIC_ATTEMPT_LATENCY,
        "Order-creation attempt latency in milliseconds"
    );
    describe_counter!(METRIC_ORDERS_PLACED, "Total number of OpenDEX orders placed");
    describe_counter!(
        METRIC_ORDERS_SKIPPED,
        "Total number of orders skipped for being below the minimum size"
    );
    describe_counter!(METRIC_ORDERS_RETRACTED, "Total number of orders retracted");
    describe_counter!(METRIC_FILLS, "Total number of OpenDEX fills received");
    describe_counter!(
        METRIC_HEDGES_PLACED,
        "Total number of centralized orders placed for OpenDEX fills"
    );
    describe_counter!(METRIC_CLEANUP_RUNS, "Total number of cleanup runs");

    debug!("Metrics initialized");
}

/// Serve Prometheus metrics on `port`.
pub fn install_exporter(port: u16) -> Result<(), BuildError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()
}

/// Increment trade info updates counter.
pub fn inc_trade_info_updates() {
    counter!(METRIC_TRADE_INFO_UPDATES).increment(1);
}

/// Increment attempts started counter.
pub fn inc_attempts_started() {
    counter!(METRIC_ATTEMPTS_STARTED).increment(1);
}

/// Increment dropped updates counter.
pub fn inc_attempts_dropped() {
    counter!(METRIC_ATTEMPTS_DROPPED).increment(1);
}

/// Increment failed attempts counter.
pub fn inc_attempts_failed() {
    counter!(METRIC_ATTEMPTS_FAILED).increment(1);
}

/// Record attempt latency.
pub fn record_attempt_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_ATTEMPT_LATENCY).record(latency_ms);
}

/// Increment placed orders counter.
pub fn inc_orders_placed() {
    counter!(METRIC_ORDERS_PLACED).increment(1);
}

/// Increment skipped orders counter.
pub fn inc_orders_skipped() {
    counter!(METRIC_ORDERS_SKIPPED).increment(1);
}

/// Add retracted orders for a venue.
pub fn add_orders_retracted(venue: &'static str, count: usize) {
    counter!(METRIC_ORDERS_RETRACTED, "venue" => venue).increment(count as u64);
}

/// Increment fills counter.
pub fn inc_fills() {
    counter!(METRIC_FILLS).increment(1);
}

/// Increment centralized orders counter.
pub fn inc_hedges_placed() {
    counter!(METRIC_HEDGES_PLACED).increment(1);
}

/// Increment cleanup runs counter.
pub fn inc_cleanup_runs() {
    counter!(METRIC_CLEANUP_RUNS).increment(1);
}

//! Prometheus metrics for the request pipeline.
//!
//! Metrics are exposed on a dedicated listener (`METRICS_PORT`) rather than
//! through the application router, so they never pass through the pipeline.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `front_door_requests_throttled_total` - Requests rejected with 429
//! - `front_door_auth_failures_total` - Bearer authentication failures (label: reason)
//! - `front_door_basic_auth_failures_total` - Rejected documentation requests
//! - `front_door_unhandled_failures_total` - Failures normalized to 500 (label: kind)
//! - `front_door_cache_errors_total` - Cache operations that failed during admission
//!
//! ## Gauges
//! - `front_door_cache_entries` - Live entries in the in-process cache after each sweep
//!
//! Recording functions are safe to call before (or without) [`init_metrics`];
//! they become no-ops when no recorder is installed.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_THROTTLED_TOTAL: &str = "front_door_requests_throttled_total";
    pub const AUTH_FAILURES_TOTAL: &str = "front_door_auth_failures_total";
    pub const BASIC_AUTH_FAILURES_TOTAL: &str = "front_door_basic_auth_failures_total";
    pub const UNHANDLED_FAILURES_TOTAL: &str = "front_door_unhandled_failures_total";
    pub const CACHE_ERRORS_TOTAL: &str = "front_door_cache_errors_total";
    pub const CACHE_ENTRIES: &str = "front_door_cache_entries";
}

/// Install the Prometheus exporter and describe every metric.
///
/// # Errors
///
/// Returns a message if the exporter cannot bind or a recorder is already
/// installed.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::REQUESTS_THROTTLED_TOTAL,
        "Requests rejected by the fixed-window rate limiter"
    );
    describe_counter!(
        names::AUTH_FAILURES_TOTAL,
        "Bearer authentication failures by reason"
    );
    describe_counter!(
        names::BASIC_AUTH_FAILURES_TOTAL,
        "Documentation requests rejected by the basic-auth gate"
    );
    describe_counter!(
        names::UNHANDLED_FAILURES_TOTAL,
        "Unhandled failures converted to 500 responses"
    );
    describe_counter!(
        names::CACHE_ERRORS_TOTAL,
        "Cache operations that failed while admitting a request"
    );
    describe_gauge!(
        names::CACHE_ENTRIES,
        "Entries held by the in-process cache after the last sweep"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Initialize metrics, logging and continuing on failure.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_throttled() {
    counter!(names::REQUESTS_THROTTLED_TOTAL).increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!(names::AUTH_FAILURES_TOTAL, "reason" => reason).increment(1);
}

pub fn record_basic_auth_failure() {
    counter!(names::BASIC_AUTH_FAILURES_TOTAL).increment(1);
}

/// `kind` is one of `panic`, `error` or `service`.
pub fn record_unhandled_failure(kind: &'static str) {
    counter!(names::UNHANDLED_FAILURES_TOTAL, "kind" => kind).increment(1);
}

pub fn record_cache_error() {
    counter!(names::CACHE_ERRORS_TOTAL).increment(1);
}

pub fn set_cache_entries(entries: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!(names::CACHE_ENTRIES).set(entries as f64);
}

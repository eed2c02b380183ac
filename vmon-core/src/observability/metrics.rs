//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//! - plain names for gauges

use metrics::{describe_counter, describe_gauge};

/// Register all core metrics with descriptions.
///
/// This ensures metrics appear in `/metrics` with proper metadata.
pub fn register_core_metrics() {
    // Request metrics
    describe_counter!(
        "vmon_requests_total",
        "Total number of metric checks (by check, outcome: ok, pending or error kind)"
    );

    // Registration metrics
    describe_counter!(
        "vmon_counter_registrations_total",
        "Total number of performance counters registered (by entity kind)"
    );
    describe_counter!(
        "vmon_custom_query_registrations_total",
        "Total number of custom queries registered (by query kind)"
    );

    // Snapshot store metrics
    describe_counter!(
        "vmon_snapshot_publish_total",
        "Total number of collector results stored (by outcome: ready, failed)"
    );
    describe_gauge!("vmon_endpoints", "Current number of endpoints (by state: pending, ready, failed)");
}

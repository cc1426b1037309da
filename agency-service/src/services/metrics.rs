//! Prometheus metrics for agency-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

/// Handle for the recorder behind the `metrics` facade (HTTP middleware).
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Tenant router decision counter by action.
pub static ROUTE_DECISIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "agency_route_decisions_total",
        "Total number of tenant router decisions",
        &["action"] // rewrite, redirect, require_auth, passthrough
    )
    .expect("Failed to register route_decisions_total")
});

/// Accepted invitation counter by granted role.
pub static INVITATIONS_ACCEPTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "agency_invitations_accepted_total",
        "Total number of invitations accepted",
        &["role"]
    )
    .expect("Failed to register invitations_accepted_total")
});

/// Activity feed write counter by outcome.
pub static ACTIVITY_WRITES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "agency_activity_writes_total",
        "Total number of activity feed writes",
        &["outcome"] // recorded, skipped, error
    )
    .expect("Failed to register activity_writes_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "agency_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize the metrics recorder and force lazy registration.
///
/// Call once at process startup. Tests skip this; lazily registered metrics
/// still work without the facade recorder.
pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if METRICS_HANDLE.set(handle).is_err() {
        panic!("failed to set metrics handle: already initialized");
    }

    Lazy::force(&ROUTE_DECISIONS_TOTAL);
    Lazy::force(&INVITATIONS_ACCEPTED_TOTAL);
    Lazy::force(&ACTIVITY_WRITES_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
///
/// Combines the facade recorder output (HTTP request metrics) with the
/// default-registry metrics registered above.
pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    if let Ok(custom_metrics) = encoder.encode_to_string(&metric_families) {
        output.push_str(&custom_metrics);
    }

    output
}

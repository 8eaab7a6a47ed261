//! Prometheus metrics for the swapwatch tracker.
//!
//! Covers:
//! - Upstream requests, retries and latency
//! - Polling cycles and active sessions
//! - Divergences and completion records
//! - Gateway relay responses
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Total upstream requests by outcome.
/// Labels: outcome (ok/network/timeout/server/http/application/invalid_response)
pub static UPSTREAM_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "swapwatch_upstream_requests_total",
        "Total upstream order-status requests",
        &["outcome"]
    )
    .unwrap()
});

/// Total retries of transient upstream failures.
pub static UPSTREAM_RETRIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "swapwatch_upstream_retries_total",
        "Total retried upstream requests"
    )
    .unwrap()
});

/// Upstream request latency in milliseconds.
pub static UPSTREAM_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "swapwatch_upstream_latency_ms",
        "Upstream request latency in milliseconds",
        &["endpoint"],
        vec![10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Polling cycles by outcome.
/// Labels: trigger (scheduled/forced/simulated), outcome (updated/soft_failure/fatal)
pub static POLL_CYCLES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "swapwatch_poll_cycles_total",
        "Total polling cycles",
        &["trigger", "outcome"]
    )
    .unwrap()
});

/// Currently polling sessions.
pub static ACTIVE_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "swapwatch_active_sessions",
        "Number of polling sessions in the Polling phase"
    )
    .unwrap()
});

/// Divergences detected by kind.
pub static DIVERGENCES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "swapwatch_divergences_total",
        "Total divergences between expected and observed order state",
        &["kind"]
    )
    .unwrap()
});

/// Completion records written.
pub static COMPLETIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "swapwatch_completions_total",
        "Total completion records written",
        &["status", "simulated"]
    )
    .unwrap()
});

/// Gateway relay responses by HTTP status.
pub static GATEWAY_RESPONSES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "swapwatch_gateway_responses_total",
        "Total gateway relay responses",
        &["status"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record one upstream request outcome.
    pub fn upstream_request(outcome: &str) {
        UPSTREAM_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record a retry after a transient failure.
    pub fn upstream_retry() {
        UPSTREAM_RETRIES_TOTAL.inc();
    }

    /// Record upstream latency.
    pub fn upstream_latency(endpoint: &str, latency_ms: f64) {
        UPSTREAM_LATENCY_MS
            .with_label_values(&[endpoint])
            .observe(latency_ms);
    }

    /// Record a polling cycle.
    pub fn poll_cycle(trigger: &str, outcome: &str) {
        POLL_CYCLES_TOTAL
            .with_label_values(&[trigger, outcome])
            .inc();
    }

    pub fn session_started() {
        ACTIVE_SESSIONS.inc();
    }

    pub fn session_stopped() {
        ACTIVE_SESSIONS.dec();
    }

    /// Record a detected divergence.
    pub fn divergence(kind: &str) {
        DIVERGENCES_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record a written completion record.
    pub fn completion_recorded(status: &str, simulated: bool) {
        let simulated = if simulated { "true" } else { "false" };
        COMPLETIONS_TOTAL
            .with_label_values(&[status, simulated])
            .inc();
    }

    /// Record a gateway response.
    pub fn gateway_response(status: u16) {
        GATEWAY_RESPONSES_TOTAL
            .with_label_values(&[&status.to_string()])
            .inc();
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

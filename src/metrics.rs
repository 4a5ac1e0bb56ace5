//! Prometheus metrics, served by pingora's prometheus service when enabled.

use std::time::Instant;

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

pub static BRIDGE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "mcp_bridge_requests_total",
        "Bridge requests by reply mode and outcome",
        &["mode", "outcome"]
    )
    .expect("metric can be registered")
});

pub static UPSTREAM_ERRORS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "mcp_bridge_upstream_errors_total",
        "Failed calls to the remote endpoint"
    )
    .expect("metric can be registered")
});

pub static IMPLICIT_HANDSHAKES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "mcp_bridge_implicit_handshakes_total",
        "Initialize calls sent on the caller's behalf"
    )
    .expect("metric can be registered")
});

pub static UPSTREAM_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "mcp_bridge_upstream_latency_seconds",
        "Time until the remote endpoint answered"
    )
    .expect("metric can be registered")
});

pub fn observe_upstream(started: Instant, ok: bool) {
    UPSTREAM_LATENCY.observe(started.elapsed().as_secs_f64());
    if !ok {
        UPSTREAM_ERRORS.inc();
    }
}

pub fn record_request(mode: &str, outcome: &str) {
    BRIDGE_REQUESTS.with_label_values(&[mode, outcome]).inc();
}

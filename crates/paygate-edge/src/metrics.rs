use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Auth counters
pub static AUTH_ATTEMPTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "edge_auth_attempts_total",
            "Login/registration attempts by outcome",
        ),
        &["kind", "outcome"],
    )
    .unwrap()
});

// Proxy metrics
pub static PROXY_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("edge_proxy_requests_total", "Total number of proxied requests"),
        &["method", "status"],
    )
    .unwrap()
});

pub static PROXY_LATENCY: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("edge_proxy_latency_seconds", "Proxy request latency")
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
    )
    .unwrap()
});

pub static UPSTREAM_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "edge_upstream_failures_total",
            "Backend calls that failed at the transport level",
        ),
        &["reason"],
    )
    .unwrap()
});

/// Register all metrics with the registry
pub fn register_metrics() {
    REGISTRY.register(Box::new(AUTH_ATTEMPTS.clone())).unwrap();
    REGISTRY
        .register(Box::new(PROXY_REQUESTS_TOTAL.clone()))
        .unwrap();
    REGISTRY.register(Box::new(PROXY_LATENCY.clone())).unwrap();
    REGISTRY
        .register(Box::new(UPSTREAM_FAILURES.clone()))
        .unwrap();
}

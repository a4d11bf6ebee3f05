//! Prometheus metrics for plugin invocations

use prometheus::{Encoder, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Invocations by outcome
pub static INVOCATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("plugbot_invocations_total", "Total number of plugin invocations"),
        &["status"],
    )
    .expect("metric can be created")
});

/// Invocation wall-clock time in seconds
pub static INVOCATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "plugbot_invocation_duration_seconds",
            "Plugin invocation duration in seconds",
        ),
        &["status"],
    )
    .expect("metric can be created")
});

/// Register metrics with [`REGISTRY`]
pub fn init() {
    // already-registered errors are fine when init runs more than once
    let _ = REGISTRY.register(Box::new(INVOCATIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(INVOCATION_DURATION_SECONDS.clone()));
}

/// Record one finished invocation
pub fn record(status: &str, elapsed: Duration) {
    INVOCATIONS_TOTAL.with_label_values(&[status]).inc();
    INVOCATION_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(elapsed.as_secs_f64());
}

/// Gather metrics in Prometheus text format
pub fn gather() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

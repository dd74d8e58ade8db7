//! Prometheus metrics for suggest-service.
//!
//! Helpers are no-ops until [`init_metrics`] has run, so unit tests and
//! library users never need a registry.

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Endpoint metrics
pub static SUGGEST_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static SUGGEST_REQUEST_DURATION_SECONDS: OnceLock<Histogram> = OnceLock::new();
pub static SUGGEST_VALIDATION_FAILURES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static SUGGEST_UNEXPECTED_COUNT_TOTAL: OnceLock<IntCounter> = OnceLock::new();

// Provider metrics
pub static GENAI_PROVIDER_LATENCY_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static GENAI_PROVIDER_ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Safe to call more than once; only the first call
/// registers anything.
pub fn init_metrics() {
    if REGISTRY.get().is_some() {
        return;
    }

    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("suggest_requests_total", "Total suggestion requests"),
        &["outcome"], // ok, upstream_error, validation_error
    )
    .expect("Failed to create suggest_requests_total metric");

    let request_duration = Histogram::with_opts(
        HistogramOpts::new(
            "suggest_request_duration_seconds",
            "Suggestion request duration in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0]),
    )
    .expect("Failed to create suggest_request_duration_seconds metric");

    let validation_failures = IntCounterVec::new(
        Opts::new(
            "suggest_validation_failures_total",
            "Model outputs rejected by validation",
        ),
        &["reason"],
    )
    .expect("Failed to create suggest_validation_failures_total metric");

    let unexpected_count = IntCounter::new(
        "suggest_unexpected_count_total",
        "Valid responses whose length differs from the expected count",
    )
    .expect("Failed to create suggest_unexpected_count_total metric");

    let provider_latency = HistogramVec::new(
        HistogramOpts::new(
            "genai_provider_latency_seconds",
            "AI provider API latency in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["provider", "model"],
    )
    .expect("Failed to create genai_provider_latency_seconds metric");

    let provider_errors = IntCounterVec::new(
        Opts::new("genai_provider_errors_total", "Total AI provider errors"),
        &["provider", "error_type"],
    )
    .expect("Failed to create genai_provider_errors_total metric");

    registry
        .register(Box::new(requests_total.clone()))
        .expect("Failed to register suggest_requests_total");
    registry
        .register(Box::new(request_duration.clone()))
        .expect("Failed to register suggest_request_duration_seconds");
    registry
        .register(Box::new(validation_failures.clone()))
        .expect("Failed to register suggest_validation_failures_total");
    registry
        .register(Box::new(unexpected_count.clone()))
        .expect("Failed to register suggest_unexpected_count_total");
    registry
        .register(Box::new(provider_latency.clone()))
        .expect("Failed to register genai_provider_latency_seconds");
    registry
        .register(Box::new(provider_errors.clone()))
        .expect("Failed to register genai_provider_errors_total");

    if REGISTRY.set(registry).is_err() {
        // Lost an init race; the winner's handles are already in place.
        return;
    }
    let _ = SUGGEST_REQUESTS_TOTAL.set(requests_total);
    let _ = SUGGEST_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = SUGGEST_VALIDATION_FAILURES_TOTAL.set(validation_failures);
    let _ = SUGGEST_UNEXPECTED_COUNT_TOTAL.set(unexpected_count);
    let _ = GENAI_PROVIDER_LATENCY_SECONDS.set(provider_latency);
    let _ = GENAI_PROVIDER_ERRORS_TOTAL.set(provider_errors);

    tracing::info!("Prometheus metrics initialized");
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();

    let registry = match REGISTRY.get() {
        Some(r) => r,
        None => {
            tracing::error!("Metrics registry not initialized");
            return "# Metrics registry not initialized\n".to_string();
        }
    };

    let metric_families = registry.gather();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return format!("# Failed to encode metrics: {}\n", e);
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to convert metrics to UTF-8");
            format!("# Failed to convert metrics to UTF-8: {}\n", e)
        }
    }
}

// Helper functions for recording metrics

/// Record a finished suggestion request.
pub fn record_suggest_request(outcome: &str, duration_secs: f64) {
    if let Some(counter) = SUGGEST_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
    if let Some(histogram) = SUGGEST_REQUEST_DURATION_SECONDS.get() {
        histogram.observe(duration_secs);
    }
}

/// Record a rejected model output.
pub fn record_validation_failure(reason: &str) {
    if let Some(counter) = SUGGEST_VALIDATION_FAILURES_TOTAL.get() {
        counter.with_label_values(&[reason]).inc();
    }
}

/// Record a valid response with an unexpected number of suggestions.
pub fn record_unexpected_count() {
    if let Some(counter) = SUGGEST_UNEXPECTED_COUNT_TOTAL.get() {
        counter.inc();
    }
}

/// Record provider latency.
pub fn record_provider_latency(provider: &str, model: &str, duration_secs: f64) {
    if let Some(histogram) = GENAI_PROVIDER_LATENCY_SECONDS.get() {
        histogram
            .with_label_values(&[provider, model])
            .observe(duration_secs);
    }
}

/// Record a provider error.
pub fn record_provider_error(provider: &str, error_type: &str) {
    if let Some(counter) = GENAI_PROVIDER_ERRORS_TOTAL.get() {
        counter.with_label_values(&[provider, error_type]).inc();
    }
}

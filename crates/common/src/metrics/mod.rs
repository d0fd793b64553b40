//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with latency histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::net::SocketAddr;

/// Metrics prefix for all review assistant metrics
pub const METRICS_PREFIX: &str = "reviewqa";

/// Buckets for retrieval latency (embedding call + vector lookup), in seconds
pub const RETRIEVAL_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
];

/// Buckets for generation latency (local models are slow)
pub const GENERATION_BUCKETS: &[f64] = &[
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    5.000,  // 5s
    10.00,  // 10s
    20.00,  // 20s
    30.00,  // 30s
    60.00,  // 60s
    120.0,  // 120s
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_ask_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of questions received"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Review retrieval latency in seconds"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Answer generation latency in seconds"
    );

    describe_histogram!(
        format!("{}_retrieved_reviews", METRICS_PREFIX),
        Unit::Count,
        "Number of reviews returned per question"
    );

    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_reviews_indexed_total", METRICS_PREFIX),
        Unit::Count,
        "Total reviews written to the vector store"
    );

    tracing::info!("Metrics registered");
}

/// Install the Prometheus exporter with an HTTP listener on `port`.
///
/// Port 0 disables the exporter.
pub fn install_exporter(port: u16) -> Result<(), BuildError> {
    if port == 0 {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)),
            RETRIEVAL_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_generation_duration_seconds", METRICS_PREFIX)),
            GENERATION_BUCKETS,
        )?
        .install()?;

    register_metrics();
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// Record the outcome of one ask request
pub fn record_ask(status: u16) {
    counter!(
        format!("{}_ask_requests_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the retrieval step
pub fn record_retrieval(duration_secs: f64, result_count: usize) {
    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    histogram!(format!("{}_retrieved_reviews", METRICS_PREFIX)).record(result_count as f64);
}

/// Record the generation step
pub fn record_generation(duration_secs: f64, model: &str) {
    histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .record(duration_secs);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }

    tracing::debug!(model, batch_size, success, duration_secs, "Embedding request finished");
}

/// Helper to record indexing progress
pub fn record_indexed(count: usize) {
    counter!(format!("{}_reviews_indexed_total", METRICS_PREFIX)).increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [RETRIEVAL_BUCKETS, GENERATION_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_disabled_exporter_is_noop() {
        assert!(install_exporter(0).is_ok());
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: calls must be no-ops
        record_ask(200);
        record_retrieval(0.01, 5);
        record_generation(1.5, "llama3.2");
        record_embedding(0.02, "mxbai-embed-large", 1, true);
        record_indexed(3);
    }
}

//! Metrics collection and Prometheus export module.
//!
//! This module provides:
//! - Prometheus recorder installation
//! - Snapshot rendering to a file
//! - Recording functions for every pipeline stage
//!
//! Without an installed recorder every `record_*` call is a no-op.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize metrics collection with the Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets(&[
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ])?
        .install_recorder()?;

    tracing::info!("Metrics collection initialized");
    Ok(handle)
}

/// Render the current metrics snapshot in Prometheus text format to `path`
pub fn write_metrics_snapshot(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    std::fs::write(path, handle.render())?;
    tracing::debug!(path = %path.display(), "Metrics snapshot written");
    Ok(())
}

/// Record one transform measurement
pub fn record_strategy_sample(strategy: &str, duration_secs: f64, memory_delta_mb: f64) {
    let strategy = strategy.to_string();
    ::metrics::histogram!("strategy_transform_seconds", "strategy" => strategy.clone())
        .record(duration_secs);
    ::metrics::histogram!("strategy_memory_delta_mb", "strategy" => strategy)
        .record(memory_delta_mb);
}

/// Record a recovered failure of one strategy at a given stage
pub fn record_strategy_failure(strategy: &str, stage: &'static str) {
    let strategy = strategy.to_string();
    ::metrics::counter!("strategy_failures_total", "strategy" => strategy, "stage" => stage)
        .increment(1);
}

/// Record the duration of one OCR call
pub fn record_ocr_duration(duration: Duration) {
    ::metrics::histogram!("ocr_duration_seconds").record(duration.as_secs_f64());
}

/// Record that an input image went through every strategy
pub fn record_image_processed(success: bool) {
    ::metrics::counter!(
        "images_processed_total",
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

/// Record one embedding request
pub fn record_embedding_request(success: bool, duration: Duration, attempts: u32) {
    ::metrics::counter!(
        "embedding_requests_total",
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
    ::metrics::histogram!("embedding_duration_seconds").record(duration.as_secs_f64());
    ::metrics::histogram!("embedding_attempts").record(f64::from(attempts));
}

/// Record the outcome of a full evaluation run
pub fn record_pipeline_run(duration: Duration, ranked: usize, dropped: usize) {
    ::metrics::histogram!("evaluation_run_duration_seconds").record(duration.as_secs_f64());
    ::metrics::gauge!("ranked_strategies").set(ranked as f64);
    ::metrics::gauge!("dropped_strategies").set(dropped as f64);
}

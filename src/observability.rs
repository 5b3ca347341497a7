//! Observability module for centralized metrics, tracing, and logging setup.
//!
//! This module provides:
//! - Structured logging with configurable format and level
//! - Metrics collection with a Prometheus recorder
//! - Process memory snapshots used by the measurement layer

pub mod metrics;
pub mod system_monitoring;
pub mod tracing_mod;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::LoggingConfig;

pub use self::metrics::{
    init_metrics, record_embedding_request, record_image_processed, record_ocr_duration,
    record_pipeline_run, record_strategy_failure, record_strategy_sample, write_metrics_snapshot,
};
pub use self::system_monitoring::{read_process_memory_mb, record_memory_usage};
pub use self::tracing_mod::{
    embedding_span, evaluation_run_span, init_tracing_with_config, ocr_span, stage_span,
};

/// Initialize logging and the metrics recorder, returning the handle used to
/// render the metrics snapshot at the end of a run.
pub fn init_observability(config: &LoggingConfig) -> Result<PrometheusHandle> {
    init_tracing_with_config(config)?;
    let handle = init_metrics()?;
    record_memory_usage();

    tracing::info!("Observability stack initialized successfully");
    Ok(handle)
}

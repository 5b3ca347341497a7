//! Tracing and logging setup module.
//!
//! This module provides:
//! - Structured logging configuration
//! - Tracing span creation utilities

use anyhow::Result;
use tracing_subscriber::prelude::*;

use crate::config::{LogFormat, LoggingConfig};

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &LoggingConfig) -> Result<()> {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("ocr_strategy_eval={}", config.level).parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper=warn".parse()?);

    if let Ok(obs_log) = std::env::var("OBSERVABILITY_LOG_LEVEL") {
        filter =
            filter.add_directive(format!("ocr_strategy_eval::observability={}", obs_log).parse()?);
    }

    match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?,
    }

    tracing::info!(
        log_format = ?config.format,
        log_level = %config.level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Create a span for OCR operations
pub fn ocr_span(operation: &str) -> tracing::Span {
    tracing::info_span!("ocr_operation", operation = operation, component = "ocr")
}

/// Create the root span of one evaluation run
pub fn evaluation_run_span(image_count: usize, strategy_count: usize) -> tracing::Span {
    tracing::info_span!(
        "evaluation_run",
        images = image_count,
        strategies = strategy_count,
        component = "pipeline"
    )
}

/// Create a span for one pipeline stage (extraction, embedding, similarity, ...)
pub fn stage_span(stage: &str) -> tracing::Span {
    tracing::info_span!("strategy_stage", stage = stage, component = "pipeline")
}

/// Create a span for embedding requests
pub fn embedding_span(strategy: &str, model: &str) -> tracing::Span {
    tracing::debug_span!(
        "embedding_operation",
        strategy = strategy,
        model = model,
        component = "embedding"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_can_be_entered_without_subscriber() {
        let run = evaluation_run_span(3, 10);
        let _run = run.enter();
        let stage = stage_span("extraction");
        let _stage = stage.enter();
        let _ocr = ocr_span("extract_text").entered();
        let _embed = embedding_span("Grayscale", "hashing-512").entered();
    }
}

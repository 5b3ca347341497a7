use anyhow::{Context, Result};
use chrono::Local;
use ocr_strategy_eval::config::EvalConfig;
use ocr_strategy_eval::embedding::create_embedder;
use ocr_strategy_eval::errors::AppError;
use ocr_strategy_eval::images::discover_images;
use ocr_strategy_eval::observability;
use ocr_strategy_eval::ocr::TesseractEngine;
use ocr_strategy_eval::pipeline::{EvaluationPipeline, EvaluationReport, PipelineError};
use ocr_strategy_eval::report::{
    write_extracted_text, write_performance_csv, write_similarity_matrix_csv, CsvReportWriter,
    JsonReportWriter, ReportWriter,
};
use ocr_strategy_eval::strategy::default_catalogue;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Load and validate configuration from the environment
fn load_configuration() -> Result<EvalConfig> {
    let config = EvalConfig::from_env().context("Failed to read configuration")?;
    config.validate().map_err(|e| {
        anyhow::anyhow!("Configuration validation failed: {}. Please check your environment variables.", e)
    })?;
    Ok(config)
}

/// Write the artifacts that accompany the ranking
fn write_artifacts(report: &EvaluationReport, output_dir: &Path) -> Result<()> {
    JsonReportWriter.write(&report.ranking, &output_dir.join("ranking.json"))?;

    if !report.similarity_matrix.is_empty() {
        write_similarity_matrix_csv(&report.similarity_matrix, &output_dir.join("similarity_matrix.csv"))?;
    }
    write_performance_csv(&report.averages, &output_dir.join("performance.csv"))?;

    let text_path = write_extracted_text(&report.texts, output_dir, Local::now())?;
    info!(path = %text_path.display(), "Extracted text written");
    Ok(())
}

fn print_ranking(report: &EvaluationReport) {
    println!("Rank  Strategy                    Final Score");
    for row in &report.ranking {
        println!("{:<5} {:<27} {:.4}", row.rank, row.strategy, row.score);
    }
    for dropped in &report.dropped {
        println!("  -   {:<27} dropped at {}: {}", dropped.strategy, dropped.stage, dropped.reason);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let config = load_configuration()?;

    // Initialize logging and the metrics recorder
    let metrics_handle = observability::init_observability(&config.logging)?;

    info!(
        input_dir = %config.input_dir.display(),
        output_dir = %config.output_dir.display(),
        parallel = config.pipeline.parallel_images,
        "Configuration loaded"
    );

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Failed to create output directory {}", config.output_dir.display())
    })?;

    let images = discover_images(&config.input_dir)?;
    info!(count = images.len(), "Discovered input images");

    let ocr = TesseractEngine::new(config.ocr.clone());
    ocr.warm_up()
        .map_err(AppError::from)
        .context("OCR engine failed to start")?;

    let embedder = create_embedder(&config.embedding)?;
    info!(model = %embedder.model_name(), dimension = embedder.dimension(), "Embedder ready");

    let catalogue = default_catalogue()?;
    let pipeline = EvaluationPipeline::new(Arc::new(ocr), embedder, config.pipeline.clone())?
        .with_report_writer(Arc::new(CsvReportWriter), config.output_dir.join("ranking.csv"));

    let report = match pipeline.run(&images, &catalogue).await {
        Ok(report) => report,
        Err(PipelineError::NoImages) => {
            warn!("No images found in the input folder");
            println!("No images found in the input folder");
            return Ok(());
        }
        Err(e) => {
            error!(error = %e, "Evaluation failed");
            return Err(e.into());
        }
    };

    print_ranking(&report);
    if let Some(best) = report.best() {
        info!(strategy = %best.strategy, score = best.score, "Best preprocessing strategy");
    }
    if let Some(persist_error) = &report.persist_error {
        warn!(error = %persist_error, "Ranking was not persisted");
    }

    write_artifacts(&report, &config.output_dir)?;

    observability::record_memory_usage();
    let metrics_path = config.output_dir.join("metrics.prom");
    if let Err(e) = observability::write_metrics_snapshot(&metrics_handle, &metrics_path) {
        warn!(error = %e, path = %metrics_path.display(), "Failed to write metrics snapshot");
    }

    info!("Evaluation complete");
    Ok(())
}

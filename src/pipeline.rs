//! # Evaluation Pipeline Module
//!
//! Public entry point: a batch of images plus a [`StrategyCatalogue`] in, an
//! ordered ranking plus the underlying per-strategy numbers out.
//!
//! Stages run strictly one after another: extraction (on a blocking thread,
//! optionally parallel over images), embedding, similarity, normalization,
//! scoring and ranking. All per-run state lives in a [`RunContext`] created for
//! the run, so independent runs never share state.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{error, info, warn, Instrument};

use crate::embedding::{Embedder, EmbeddingAggregator};
use crate::extraction::{ExtractionFailure, ExtractionOrchestrator, ExtractionOutput};
use crate::images::ImageLimits;
use crate::measurement::{MetricRecorder, StrategyAverages};
use crate::normalization::{MetricNormalizer, MissingMetricPolicy, NormalizedMetricSet};
use crate::ocr::OcrEngine;
use crate::ranking::{RankedResult, RankingReportBuilder};
use crate::report::ReportWriter;
use crate::scoring::{CompositeScorer, ScoreWeights};
use crate::similarity::{strategy_similarity, SimilarityMatrix, SimilarityReduction};
use crate::strategy::{DroppedStrategy, StrategyCatalogue, StrategyId};

/// Errors that end a run without a ranking
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The batch contained no images
    NoImages,
    /// Every strategy failed or was dropped
    NoRankableStrategies { dropped: Vec<DroppedStrategy> },
    /// Invalid pipeline options
    Configuration(String),
    /// A stage could not be run at all
    Internal(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::NoImages => write!(f, "[PIPELINE] No images found in the input folder"),
            PipelineError::NoRankableStrategies { dropped } => write!(
                f,
                "[PIPELINE] No strategies could be ranked ({} dropped)",
                dropped.len()
            ),
            PipelineError::Configuration(msg) => write!(f, "[PIPELINE_CONFIG] {}", msg),
            PipelineError::Internal(msg) => write!(f, "[PIPELINE_INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Tunables of a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub limits: ImageLimits,
    pub parallel_images: bool,
    pub weights: ScoreWeights,
    pub missing_metric_policy: MissingMetricPolicy,
    pub similarity_reduction: SimilarityReduction,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            limits: ImageLimits::default(),
            parallel_images: false,
            weights: ScoreWeights::default(),
            missing_metric_policy: MissingMetricPolicy::default(),
            similarity_reduction: SimilarityReduction::default(),
        }
    }
}

/// Everything a run produces
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub ranking: Vec<RankedResult>,
    /// Reduced similarity score per embedded strategy
    pub similarity: IndexMap<StrategyId, f64>,
    /// Mean transform duration in seconds
    pub average_time: IndexMap<StrategyId, f64>,
    /// Mean memory delta in megabytes
    pub average_memory: IndexMap<StrategyId, f64>,
    pub averages: IndexMap<StrategyId, StrategyAverages>,
    pub similarity_matrix: SimilarityMatrix,
    pub normalized: IndexMap<StrategyId, NormalizedMetricSet>,
    pub scores: IndexMap<StrategyId, f64>,
    pub texts: IndexMap<StrategyId, String>,
    /// Strategies absent from the ranking, one entry each
    pub dropped: Vec<DroppedStrategy>,
    pub failures: Vec<ExtractionFailure>,
    pub images_processed: usize,
    pub images_unreadable: usize,
    pub embedding_dimension: Option<usize>,
    pub missing_metric_policy: MissingMetricPolicy,
    pub weights: ScoreWeights,
    /// Set when the ranking could not be written; the ranking is still returned
    pub persist_error: Option<String>,
}

impl EvaluationReport {
    pub fn best(&self) -> Option<&RankedResult> {
        self.ranking.first()
    }
}

/// Per-run state, owned by one call to [`EvaluationPipeline::run`]
#[derive(Debug)]
struct RunContext {
    started: Instant,
    dropped: Vec<DroppedStrategy>,
}

impl RunContext {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            dropped: Vec::new(),
        }
    }

    fn note_dropped(&mut self, dropped: impl IntoIterator<Item = DroppedStrategy>) {
        self.dropped.extend(dropped);
    }

    /// One entry per catalogued strategy missing from `ranking`, first reason wins.
    fn finalize_dropped(
        &mut self,
        catalogue: &StrategyCatalogue,
        ranking: &[RankedResult],
    ) -> Vec<DroppedStrategy> {
        let ranked: HashSet<&StrategyId> = ranking.iter().map(|r| &r.strategy).collect();
        let mut seen = HashSet::new();
        let mut reasons: IndexMap<StrategyId, DroppedStrategy> = IndexMap::new();

        for entry in self.dropped.drain(..) {
            if !ranked.contains(&entry.strategy) && seen.insert(entry.strategy.clone()) {
                reasons.insert(entry.strategy.clone(), entry);
            }
        }

        catalogue
            .ids()
            .into_iter()
            .filter(|id| !ranked.contains(id))
            .map(|id| {
                reasons.shift_remove(&id).unwrap_or_else(|| {
                    DroppedStrategy::record(&id, "pipeline", "no metrics were recorded")
                })
            })
            .collect()
    }
}

pub struct EvaluationPipeline {
    ocr: Arc<dyn OcrEngine>,
    embedder: Arc<dyn Embedder>,
    options: PipelineOptions,
    recorder: MetricRecorder,
    report: Option<(Arc<dyn ReportWriter>, PathBuf)>,
}

impl EvaluationPipeline {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        embedder: Arc<dyn Embedder>,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        options
            .weights
            .validate()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        if options.limits.max_dimension == 0 {
            return Err(PipelineError::Configuration(
                "max_dimension must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            ocr,
            embedder,
            options,
            recorder: MetricRecorder::system(),
            report: None,
        })
    }

    /// Replace the clock and memory probe used to measure transforms
    pub fn with_recorder(mut self, recorder: MetricRecorder) -> Self {
        self.recorder = recorder;
        self
    }

    /// Persist the ranking with `writer` to `destination` at the end of each run
    pub fn with_report_writer(
        mut self,
        writer: Arc<dyn ReportWriter>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        self.report = Some((writer, destination.into()));
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Evaluate every strategy of `catalogue` over `images`.
    pub async fn run(
        &self,
        images: &[PathBuf],
        catalogue: &StrategyCatalogue,
    ) -> Result<EvaluationReport, PipelineError> {
        if images.is_empty() {
            warn!("No images found in the input folder");
            return Err(PipelineError::NoImages);
        }

        let span = crate::observability::evaluation_run_span(images.len(), catalogue.len());
        self.run_stages(images, catalogue).instrument(span).await
    }

    async fn run_stages(
        &self,
        images: &[PathBuf],
        catalogue: &StrategyCatalogue,
    ) -> Result<EvaluationReport, PipelineError> {
        let mut ctx = RunContext::new();

        let extraction = self.extract(images, catalogue).await?;

        let embedded = EmbeddingAggregator::new(Arc::clone(&self.embedder))
            .embed(&extraction.texts)
            .instrument(crate::observability::stage_span("embedding"))
            .await;
        ctx.note_dropped(embedded.dropped);

        let (similarity_matrix, similarity) = {
            let _stage = crate::observability::stage_span("similarity").entered();
            strategy_similarity(&embedded.embeddings, self.options.similarity_reduction)
        };

        let averages = extraction.metrics.averages();
        let average_time: IndexMap<StrategyId, f64> = averages
            .iter()
            .map(|(id, avg)| (id.clone(), avg.time_seconds))
            .collect();
        let average_memory: IndexMap<StrategyId, f64> = averages
            .iter()
            .map(|(id, avg)| (id.clone(), avg.memory_mb))
            .collect();

        let (normalized, scores, ranking) = {
            let _stage = crate::observability::stage_span("ranking").entered();
            let normalization = MetricNormalizer::new(self.options.missing_metric_policy)
                .normalize(&catalogue.ids(), &similarity, &average_time, &average_memory);
            ctx.note_dropped(normalization.dropped);

            let scores = CompositeScorer::new(self.options.weights).score_all(&normalization.normalized);
            let ranking = RankingReportBuilder::new().rank(&scores);
            (normalization.normalized, scores, ranking)
        };

        let dropped = ctx.finalize_dropped(catalogue, &ranking);
        crate::observability::record_pipeline_run(ctx.started.elapsed(), ranking.len(), dropped.len());

        if ranking.is_empty() {
            error!(dropped = dropped.len(), "No strategies could be ranked");
            return Err(PipelineError::NoRankableStrategies { dropped });
        }

        let persist_error = self.persist(&ranking);

        info!(
            ranked = ranking.len(),
            dropped = dropped.len(),
            best = %ranking[0].strategy,
            best_score = ranking[0].score,
            elapsed_ms = ctx.started.elapsed().as_millis() as u64,
            "Evaluation run completed"
        );

        Ok(EvaluationReport {
            ranking,
            similarity,
            average_time,
            average_memory,
            averages,
            similarity_matrix,
            normalized,
            scores,
            texts: extraction.texts,
            dropped,
            failures: extraction.failures,
            images_processed: extraction.images_processed,
            images_unreadable: extraction.images_unreadable,
            embedding_dimension: embedded.dimension,
            missing_metric_policy: self.options.missing_metric_policy,
            weights: self.options.weights,
            persist_error,
        })
    }

    async fn extract(
        &self,
        images: &[PathBuf],
        catalogue: &StrategyCatalogue,
    ) -> Result<ExtractionOutput, PipelineError> {
        let orchestrator =
            ExtractionOrchestrator::new(Arc::clone(&self.ocr), self.recorder.clone(), self.options.limits)
                .with_parallel(self.options.parallel_images);
        let images = images.to_vec();
        let catalogue = catalogue.clone();
        let span = crate::observability::stage_span("extraction");

        tokio::task::spawn_blocking(move || {
            let _stage = span.enter();
            orchestrator.run(&images, &catalogue)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("Extraction task failed: {e}")))
    }

    fn persist(&self, ranking: &[RankedResult]) -> Option<String> {
        let (writer, destination) = self.report.as_ref()?;
        match writer.write(ranking, destination) {
            Ok(()) => {
                info!(path = %destination.display(), "Ranking report written");
                None
            }
            Err(e) => {
                crate::errors::error_logging::log_filesystem_error(
                    &e,
                    "write_ranking_report",
                    destination.to_str(),
                );
                Some(e.to_string())
            }
        }
    }
}

impl fmt::Debug for EvaluationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationPipeline")
            .field("options", &self.options)
            .field("embedder", &self.embedder.model_name())
            .finish_non_exhaustive()
    }
}

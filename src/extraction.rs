//! # Extraction Orchestrator Module
//!
//! Applies every catalogued strategy to every input image, measures the transform,
//! runs OCR on the result and accumulates the extracted text per strategy.
//!
//! Images are processed in the order supplied and strategies in catalogue order,
//! each against its own copy of the normalized source. A failure for one
//! (image, strategy) pair is logged and the batch moves on; the strategy simply
//! contributes nothing for that image.
//!
//! In parallel mode each image is processed independently into a partial result,
//! and the partial results are concatenated in image order once all images are
//! done, so the aggregated text is identical to a sequential run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::error_logging;
use crate::images::{load_source_image, ImageLimits};
use crate::measurement::{MeasurementError, MeasurementSample, MetricRecorder, MetricSeries};
use crate::ocr::OcrEngine;
use crate::strategy::{Strategy, StrategyCatalogue, StrategyId};

/// Stage at which an (image, strategy) pair failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    ImageLoad,
    Measurement,
    Transform,
    Ocr,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::ImageLoad => "image_load",
            FailureStage::Measurement => "measurement",
            FailureStage::Transform => "transform",
            FailureStage::Ocr => "ocr",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recovered failure, kept for the run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionFailure {
    pub image: PathBuf,
    /// `None` when the image itself could not be loaded
    pub strategy: Option<StrategyId>,
    pub stage: FailureStage,
    pub message: String,
}

/// Everything the extraction stage produces for one batch.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutput {
    /// One entry per catalogued strategy, in catalogue order; may be empty
    pub texts: IndexMap<StrategyId, String>,
    pub metrics: MetricSeries,
    pub failures: Vec<ExtractionFailure>,
    pub images_processed: usize,
    pub images_unreadable: usize,
}

/// Partial result for one image.
#[derive(Debug, Default)]
struct ImageOutcome {
    texts: Vec<(StrategyId, String)>,
    samples: Vec<MeasurementSample>,
    failures: Vec<ExtractionFailure>,
    unreadable: bool,
}

#[derive(Clone)]
pub struct ExtractionOrchestrator {
    ocr: Arc<dyn OcrEngine>,
    recorder: MetricRecorder,
    limits: ImageLimits,
    parallel: bool,
}

impl ExtractionOrchestrator {
    pub fn new(ocr: Arc<dyn OcrEngine>, recorder: MetricRecorder, limits: ImageLimits) -> Self {
        Self {
            ocr,
            recorder,
            limits,
            parallel: false,
        }
    }

    /// Process images concurrently. Memory deltas then include concurrent work.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every strategy over every image.
    pub fn run(&self, images: &[PathBuf], catalogue: &StrategyCatalogue) -> ExtractionOutput {
        info!(
            images = images.len(),
            strategies = catalogue.len(),
            parallel = self.parallel,
            "Starting text extraction"
        );

        let outcomes: Vec<ImageOutcome> = if self.parallel {
            images
                .par_iter()
                .map(|path| self.process_image(path, catalogue))
                .collect()
        } else {
            images
                .iter()
                .map(|path| self.process_image(path, catalogue))
                .collect()
        };

        let mut output = ExtractionOutput {
            texts: catalogue.ids().into_iter().map(|id| (id, String::new())).collect(),
            ..ExtractionOutput::default()
        };

        for outcome in outcomes {
            if outcome.unreadable {
                output.images_unreadable += 1;
            } else {
                output.images_processed += 1;
            }
            for (id, text) in outcome.texts {
                let aggregated = output.texts.entry(id).or_default();
                if !aggregated.is_empty() {
                    aggregated.push('\n');
                }
                aggregated.push_str(&text);
            }
            output.metrics.extend(outcome.samples);
            output.failures.extend(outcome.failures);
        }

        info!(
            images_processed = output.images_processed,
            images_unreadable = output.images_unreadable,
            failures = output.failures.len(),
            "Text extraction completed"
        );
        output
    }

    fn process_image(&self, path: &Path, catalogue: &StrategyCatalogue) -> ImageOutcome {
        let mut outcome = ImageOutcome::default();
        let image_label = path.display().to_string();

        let source = match load_source_image(path, &self.limits) {
            Ok(img) => img,
            Err(e) => {
                let file_size = std::fs::metadata(path).ok().map(|m| m.len());
                error_logging::log_image_error(&e, &image_label, file_size);
                crate::observability::record_image_processed(false);
                outcome.unreadable = true;
                outcome.failures.push(ExtractionFailure {
                    image: path.to_path_buf(),
                    strategy: None,
                    stage: FailureStage::ImageLoad,
                    message: e.to_string(),
                });
                return outcome;
            }
        };

        for strategy in catalogue.iter() {
            match self.process_pair(path, &source, strategy, &mut outcome.samples) {
                Ok(text) if text.is_empty() => {
                    debug!(image = %image_label, strategy = %strategy.id(), "OCR returned no text");
                }
                Ok(text) => outcome.texts.push((strategy.id().clone(), text)),
                Err((stage, message)) => {
                    error_logging::log_strategy_failure(
                        &message,
                        stage.as_str(),
                        &image_label,
                        strategy.id().as_str(),
                    );
                    crate::observability::record_strategy_failure(
                        strategy.id().as_str(),
                        stage.as_str(),
                    );
                    outcome.failures.push(ExtractionFailure {
                        image: path.to_path_buf(),
                        strategy: Some(strategy.id().clone()),
                        stage,
                        message,
                    });
                }
            }
        }

        crate::observability::record_image_processed(true);
        outcome
    }

    /// Transform under measurement, then OCR. The sample is kept even when OCR
    /// fails afterwards.
    fn process_pair(
        &self,
        path: &Path,
        source: &DynamicImage,
        strategy: &Strategy,
        samples: &mut Vec<MeasurementSample>,
    ) -> Result<String, (FailureStage, String)> {
        let (processed, sample) = self
            .recorder
            .measure(path, strategy.id(), || strategy.apply(source))
            .map_err(|e| match e {
                MeasurementError::Recording(msg) => (FailureStage::Measurement, msg),
                MeasurementError::Action(err) => (FailureStage::Transform, err.to_string()),
            })?;
        samples.push(sample);

        let text = self
            .ocr
            .extract_text(&processed)
            .map_err(|e| (FailureStage::Ocr, e.to_string()))?;
        Ok(text.trim().to_string())
    }
}

impl fmt::Debug for ExtractionOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionOrchestrator")
            .field("limits", &self.limits)
            .field("parallel", &self.parallel)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::{Clock, NullMemoryProbe};
    use crate::ocr_errors::OcrError;
    use crate::preprocessing::PreprocessingError;
    use crate::strategy::BuiltinStrategy;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicU64, Ordering};
    use tempfile::TempDir;

    /// Advances one second per reading
    struct TickingClock(AtomicU64);

    impl Clock for TickingClock {
        fn now_seconds(&self) -> Result<f64, String> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst) as f64)
        }
    }

    /// Reads back the image width as text, failing for 1-pixel-wide images
    struct WidthOcr;

    impl OcrEngine for WidthOcr {
        fn extract_text(&self, image: &DynamicImage) -> Result<String, OcrError> {
            match image.width() {
                1 => Err(OcrError::Extraction("too narrow".to_string())),
                w => Ok(format!("  width {w}  \n")),
            }
        }
    }

    fn orchestrator(parallel: bool) -> ExtractionOrchestrator {
        let recorder = MetricRecorder::new(
            Arc::new(TickingClock(AtomicU64::new(0))),
            Arc::new(NullMemoryProbe),
        );
        ExtractionOrchestrator::new(Arc::new(WidthOcr), recorder, ImageLimits::default())
            .with_parallel(parallel)
    }

    fn write_images(dir: &TempDir, widths: &[u32]) -> Vec<PathBuf> {
        widths
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let path = dir.path().join(format!("img_{i}.png"));
                RgbaImage::from_pixel(w, 4, Rgba([255, 255, 255, 255])).save(&path).unwrap();
                path
            })
            .collect()
    }

    fn catalogue() -> StrategyCatalogue {
        let mut catalogue = StrategyCatalogue::new();
        catalogue.register_builtin(BuiltinStrategy::Grayscale).unwrap();
        catalogue
            .register("Broken", |_: &DynamicImage| -> Result<DynamicImage, PreprocessingError> {
                Err(PreprocessingError::ProcessingFailed { message: "bad".to_string() })
            })
            .unwrap();
        catalogue
    }

    #[test]
    fn test_texts_are_trimmed_and_joined_in_image_order() {
        let dir = TempDir::new().unwrap();
        let images = write_images(&dir, &[3, 5]);
        let output = orchestrator(false).run(&images, &catalogue());

        assert_eq!(output.texts["Grayscale"], "width 3\nwidth 5");
        assert_eq!(output.images_processed, 2);
        assert_eq!(output.metrics.samples_for("Grayscale").len(), 2);
    }

    #[test]
    fn test_failing_strategy_keeps_empty_entry() {
        let dir = TempDir::new().unwrap();
        let images = write_images(&dir, &[3]);
        let output = orchestrator(false).run(&images, &catalogue());

        assert_eq!(output.texts.len(), 2);
        assert_eq!(output.texts["Broken"], "");
        assert!(output.metrics.samples_for("Broken").is_empty());
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].stage, FailureStage::Transform);
    }

    #[test]
    fn test_ocr_failure_keeps_transform_sample() {
        let dir = TempDir::new().unwrap();
        let images = write_images(&dir, &[1, 4]);
        let output = orchestrator(false).run(&images, &catalogue());

        assert_eq!(output.texts["Grayscale"], "width 4");
        assert_eq!(output.metrics.samples_for("Grayscale").len(), 2);
        assert!(output
            .failures
            .iter()
            .any(|f| f.stage == FailureStage::Ocr && f.image == images[0]));
    }

    #[test]
    fn test_unreadable_image_skips_all_strategies() {
        let dir = TempDir::new().unwrap();
        let mut images = write_images(&dir, &[6]);
        let bogus = dir.path().join("bogus.png");
        std::fs::write(&bogus, b"garbage").unwrap();
        images.insert(0, bogus.clone());

        let output = orchestrator(false).run(&images, &catalogue());
        assert_eq!(output.images_unreadable, 1);
        assert_eq!(output.images_processed, 1);
        assert_eq!(output.texts["Grayscale"], "width 6");
        assert_eq!(output.failures[0].stage, FailureStage::ImageLoad);
        assert_eq!(output.failures[0].strategy, None);
    }

    #[test]
    fn test_parallel_matches_sequential_text() {
        let dir = TempDir::new().unwrap();
        let images = write_images(&dir, &[2, 3, 4, 5, 6, 7, 8, 9]);
        let sequential = orchestrator(false).run(&images, &catalogue());
        let parallel = orchestrator(true).run(&images, &catalogue());

        assert_eq!(sequential.texts, parallel.texts);
        assert_eq!(parallel.metrics.total_samples(), 8);
    }

    #[test]
    fn test_strategies_see_independent_copies() {
        let dir = TempDir::new().unwrap();
        let images = write_images(&dir, &[3]);
        let mut catalogue = StrategyCatalogue::new();
        catalogue
            .register("Crop", |img: &DynamicImage| -> Result<DynamicImage, PreprocessingError> {
                Ok(img.crop_imm(0, 0, 2, 2))
            })
            .unwrap();
        catalogue.register_builtin(BuiltinStrategy::Grayscale).unwrap();

        let output = orchestrator(false).run(&images, &catalogue);
        assert_eq!(output.texts["Crop"], "width 2");
        assert_eq!(output.texts["Grayscale"], "width 3");
    }
}

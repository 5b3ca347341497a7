//! # OCR Processing Module
//!
//! This module provides the optical character recognition collaborator used by the
//! extraction orchestrator. The orchestrator only depends on the [`OcrEngine`] trait;
//! [`TesseractEngine`] is the production implementation backed by `leptess`.
//!
//! ## Dependencies
//!
//! - `leptess`: Rust bindings for Tesseract OCR and Leptonica
//! - `image`: in-memory PNG encoding of preprocessed images
//! - `tracing`: structured logging

use std::io::Cursor;
use std::time::Instant;

use image::DynamicImage;
use tracing::debug;

pub use crate::instance_manager::OcrInstanceManager;
pub use crate::ocr_config::{ModelType, OcrConfig, PageSegMode};
pub use crate::ocr_errors::OcrError;

/// External OCR collaborator: receives an image, returns raw extracted text or an error.
///
/// Implementations must be shareable across the threads used for parallel image
/// processing. No retry policy is imposed by callers.
pub trait OcrEngine: Send + Sync {
    fn extract_text(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

/// Clean up extracted text: trim every line and drop empty lines
pub fn clean_extracted_text(raw: &str) -> String {
    raw.trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Reject images Tesseract cannot be given: either side zero
pub fn validate_dimensions(image: &DynamicImage) -> Result<(), OcrError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(OcrError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Encode an image as PNG bytes for engines that consume encoded input
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, OcrError> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .map_err(|e| OcrError::ImageLoad(format!("Failed to encode image as PNG: {e}")))?;
    Ok(buffer)
}

/// Tesseract-backed OCR engine with pooled instances
pub struct TesseractEngine {
    config: OcrConfig,
    instances: OcrInstanceManager,
}

impl TesseractEngine {
    /// Create an engine; the Tesseract instance is initialized lazily on first use
    pub fn new(config: OcrConfig) -> Self {
        Self {
            config,
            instances: OcrInstanceManager::new(),
        }
    }

    /// Eagerly initialize the Tesseract instance so configuration problems surface
    /// before a batch starts instead of as one failure per (image, strategy) pair.
    pub fn warm_up(&self) -> Result<(), OcrError> {
        self.instances
            .get_instance(&self.config)
            .map(|_| ())
            .map_err(|e| OcrError::Initialization(e.to_string()))
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }
}

impl OcrEngine for TesseractEngine {
    fn extract_text(&self, image: &DynamicImage) -> Result<String, OcrError> {
        let span = crate::observability::ocr_span("extract_text");
        let _enter = span.enter();

        validate_dimensions(image)?;
        let start_time = Instant::now();
        let png = encode_png(image)?;

        let instance = self
            .instances
            .get_instance(&self.config)
            .map_err(|e| OcrError::Initialization(e.to_string()))?;

        let extracted_text = {
            let mut tess = instance.lock();
            tess.set_image_from_mem(&png).map_err(|e| {
                OcrError::ImageLoad(format!("Failed to load image for OCR: {e}"))
            })?;
            tess.get_utf8_text().map_err(|e| {
                OcrError::Extraction(format!("Failed to extract text from image: {e}"))
            })?
        };

        let cleaned_text = clean_extracted_text(&extracted_text);
        let ocr_duration = start_time.elapsed();
        crate::observability::record_ocr_duration(ocr_duration);

        debug!(
            "OCR processing completed in {}ms, extracted {} characters",
            ocr_duration.as_millis(),
            cleaned_text.len()
        );
        Ok(cleaned_text)
    }
}

//! # OCR Error Types Module
//!
//! Failures reported by an [`OcrEngine`](crate::ocr::OcrEngine). The extraction
//! orchestrator records each one against its (image, strategy) pair and moves on.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum OcrError {
    /// The preprocessed image has no pixels to read
    InvalidDimensions { width: u32, height: u32 },
    /// Tesseract could not be started for the configured languages and model
    Initialization(String),
    /// The engine rejected the image bytes
    ImageLoad(String),
    /// Recognition ran but produced no readable result
    Extraction(String),
}

impl fmt::Display for OcrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrError::InvalidDimensions { width, height } => {
                write!(f, "[VALIDATION] Cannot run OCR on a {width}x{height} image")
            }
            OcrError::Initialization(msg) => write!(f, "[OCR_INIT] Tesseract could not be started: {msg}"),
            OcrError::ImageLoad(msg) => write!(f, "[IMAGE_LOAD] OCR engine rejected the image: {msg}"),
            OcrError::Extraction(msg) => write!(f, "[OCR_EXTRACT] No text could be read: {msg}"),
        }
    }
}

impl std::error::Error for OcrError {}

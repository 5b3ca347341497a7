//! # Shared Types for Image Preprocessing
//!
//! This module contains the shared error and result types used across
//! the preprocessing sub-modules.

use image::DynamicImage;

/// Errors that can occur during image preprocessing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessingError {
    /// A transform was constructed or invoked with an unusable parameter
    InvalidParameter { name: &'static str, message: String },
    /// The input image has no pixels
    EmptyImage,
    /// Image processing operation failed
    ProcessingFailed { message: String },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::InvalidParameter { name, message } => {
                write!(f, "Invalid parameter '{}': {}", name, message)
            }
            PreprocessingError::EmptyImage => write!(f, "Image has zero width or height"),
            PreprocessingError::ProcessingFailed { message } => {
                write!(f, "Image processing failed: {}", message)
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

/// Reject zero-sized images before any per-pixel work.
pub(crate) fn ensure_non_empty(image: &DynamicImage) -> Result<(), PreprocessingError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessingError::EmptyImage);
    }
    Ok(())
}

/// Result of deskewing operation.
#[derive(Debug, Clone)]
pub struct DeskewResult {
    /// The deskewed image
    pub image: DynamicImage,
    /// Detected skew angle in degrees
    pub skew_angle_degrees: f32,
    /// Whether a rotation was actually applied
    pub rotated: bool,
}

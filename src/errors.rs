//! # Application Error Types
//!
//! This module defines common error types used throughout the strategy evaluation
//! application. Stage-specific errors (OCR, preprocessing, embedding, reporting)
//! live beside their stages and convert into [`AppError`] at the application boundary.

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Input discovery and validation errors
    Input(String),
    /// OCR processing errors
    Ocr(String),
    /// Embedding generation errors
    Embedding(String),
    /// Report persistence errors
    Report(String),
    /// File system errors
    FileSystem(String),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Input(msg) => write!(f, "[INPUT] {}", msg),
            AppError::Ocr(msg) => write!(f, "[OCR] {}", msg),
            AppError::Embedding(msg) => write!(f, "[EMBEDDING] {}", msg),
            AppError::Report(msg) => write!(f, "[REPORT] {}", msg),
            AppError::FileSystem(msg) => write!(f, "[FILESYSTEM] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileSystem(err.to_string())
    }
}

impl From<crate::ocr_errors::OcrError> for AppError {
    fn from(err: crate::ocr_errors::OcrError) -> Self {
        AppError::Ocr(err.to_string())
    }
}

impl From<crate::embedding::EmbeddingError> for AppError {
    fn from(err: crate::embedding::EmbeddingError) -> Self {
        AppError::Embedding(err.to_string())
    }
}

impl From<crate::report::ReportError> for AppError {
    fn from(err: crate::report::ReportError) -> Self {
        AppError::Report(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the pipeline
pub mod error_logging {
    use tracing::{error, warn};

    /// Log a recovered per-(image, strategy) failure
    ///
    /// These never abort the batch; the strategy simply contributes nothing
    /// for the image.
    pub fn log_strategy_failure(
        error: &impl std::fmt::Display,
        stage: &str,
        image: &str,
        strategy: &str,
    ) {
        warn!(
            error = %error,
            stage = %stage,
            image = %image,
            strategy = %strategy,
            "Strategy failed for image, continuing with next pair"
        );
    }

    /// Log an image that could not be loaded at all
    pub fn log_image_error(error: &impl std::fmt::Display, image: &str, file_size: Option<u64>) {
        warn!(
            error = %error,
            image = %image,
            file_size_bytes = ?file_size,
            "Input image unreadable, no strategy contributes for it"
        );
    }

    /// Log a strategy removed from downstream stages
    pub fn log_strategy_dropped(strategy: &str, stage: &str, reason: &impl std::fmt::Display) {
        warn!(
            strategy = %strategy,
            stage = %stage,
            reason = %reason,
            "Strategy dropped from evaluation"
        );
    }

    /// Log embedding errors with request context
    pub fn log_embedding_error(
        error: &impl std::fmt::Display,
        strategy: &str,
        model: &str,
        attempt_count: Option<u32>,
    ) {
        error!(
            error = %error,
            strategy = %strategy,
            model = %model,
            attempt_count = ?attempt_count,
            "Embedding generation failed"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_filesystem_error(error: &impl std::fmt::Display, operation: &str, path: Option<&str>) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            "File system operation failed"
        );
    }
}

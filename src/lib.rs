//! # OCR Strategy Evaluation
//!
//! Runs a catalogue of image preprocessing strategies over a folder of images,
//! extracts text from each preprocessed variant with Tesseract, and ranks the
//! strategies by how consistent their text is (embedding similarity) against
//! what they cost in time and memory.

pub mod config;
pub mod embedding;
pub mod errors;
pub mod extraction;
pub mod images;
pub mod instance_manager;
pub mod measurement;
pub mod normalization;
pub mod observability;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;
pub mod pipeline;
pub mod preprocessing;
pub mod ranking;
pub mod report;
pub mod scoring;
pub mod similarity;
pub mod strategy;

// Re-export types for easier access
pub use config::EvalConfig;
pub use errors::{AppError, AppResult};
pub use pipeline::{EvaluationPipeline, EvaluationReport, PipelineError, PipelineOptions};
pub use ranking::RankedResult;
pub use strategy::{default_catalogue, StrategyCatalogue, StrategyId};

//! # Unified Application Configuration
//!
//! This module consolidates all run settings into a single, structured
//! configuration object loaded from environment variables (after `.env` has been
//! applied by the binary) and validated before a run starts.

use std::path::PathBuf;
use std::time::Duration;

use crate::embedding::{
    EmbeddingConfig, EmbeddingProvider, RetryConfig, DEFAULT_HASHING_DIMENSIONS,
    DEFAULT_HTTP_BASE_URL, DEFAULT_HTTP_DIMENSIONS, DEFAULT_HTTP_MODEL,
};
use crate::errors::{AppError, AppResult};
use crate::images::{ImageLimits, DEFAULT_MAX_DIMENSION};
use crate::normalization::MissingMetricPolicy;
use crate::ocr_config::{ModelType, OcrConfig, PageSegMode, DEFAULT_LANGUAGES};
use crate::pipeline::PipelineOptions;
use crate::scoring::{
    ScoreWeights, DEFAULT_MEMORY_WEIGHT, DEFAULT_SIMILARITY_WEIGHT, DEFAULT_TIME_WEIGHT,
};
use crate::similarity::SimilarityReduction;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level directive for this crate (`trace` .. `error`)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> AppResult<()> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.level.as_str()) {
            return Err(AppError::Config(format!(
                "LOG_LEVEL must be one of {}, got '{}'",
                LEVELS.join(", "),
                self.level
            )));
        }
        Ok(())
    }
}

/// Complete run configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EvalConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub pipeline: PipelineOptions,
    pub ocr: OcrConfig,
    pub embedding: EmbeddingConfig,
    pub logging: LoggingConfig,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./input"),
            output_dir: PathBuf::from("./output"),
            pipeline: PipelineOptions::default(),
            ocr: OcrConfig::default(),
            embedding: EmbeddingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EvalConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup; unset keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        // Input and output
        if let Some(dir) = get("EVAL_INPUT_DIR") {
            config.input_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("EVAL_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        // Pipeline
        config.pipeline.limits = ImageLimits {
            max_dimension: parse_number(&get, "EVAL_MAX_DIMENSION", DEFAULT_MAX_DIMENSION)?,
            max_file_size: config.ocr.max_file_size,
        };
        config.pipeline.parallel_images = parse_bool(&get, "EVAL_PARALLEL_IMAGES", false)?;
        if let Some(value) = get("EVAL_MISSING_METRIC_POLICY") {
            config.pipeline.missing_metric_policy = MissingMetricPolicy::parse(&value)
                .ok_or_else(|| {
                    AppError::Config(format!(
                        "EVAL_MISSING_METRIC_POLICY must be 'exclude' or 'worst_case', got '{value}'"
                    ))
                })?;
        }
        if let Some(value) = get("EVAL_SIMILARITY_REDUCTION") {
            config.pipeline.similarity_reduction =
                SimilarityReduction::parse(&value).ok_or_else(|| {
                    AppError::Config(format!(
                        "EVAL_SIMILARITY_REDUCTION must be 'mean_of_others' or 'reference', got '{value}'"
                    ))
                })?;
        }
        config.pipeline.weights = ScoreWeights {
            similarity: parse_number(&get, "EVAL_WEIGHT_SIMILARITY", DEFAULT_SIMILARITY_WEIGHT)?,
            time: parse_number(&get, "EVAL_WEIGHT_TIME", DEFAULT_TIME_WEIGHT)?,
            memory: parse_number(&get, "EVAL_WEIGHT_MEMORY", DEFAULT_MEMORY_WEIGHT)?,
        };

        // OCR
        config.ocr.languages = get("OCR_LANGUAGES").unwrap_or_else(|| DEFAULT_LANGUAGES.to_string());
        if let Some(value) = get("OCR_PSM") {
            config.ocr.psm_mode = PageSegMode::parse(&value).ok_or_else(|| {
                AppError::Config(format!("OCR_PSM is not a supported page segmentation mode: '{value}'"))
            })?;
        }
        if let Some(value) = get("OCR_MODEL") {
            config.ocr.model_type = ModelType::parse(&value).ok_or_else(|| {
                AppError::Config(format!("OCR_MODEL must be 'fast' or 'best', got '{value}'"))
            })?;
        }

        // Embedding
        if let Some(value) = get("EMBEDDING_PROVIDER") {
            config.embedding.provider = EmbeddingProvider::parse(&value).ok_or_else(|| {
                AppError::Config(format!("EMBEDDING_PROVIDER must be 'hashing' or 'http', got '{value}'"))
            })?;
        }
        config.embedding.base_url =
            get("EMBEDDING_BASE_URL").unwrap_or_else(|| DEFAULT_HTTP_BASE_URL.to_string());
        config.embedding.model =
            get("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_HTTP_MODEL.to_string());
        config.embedding.api_key = get("EMBEDDING_API_KEY").or_else(|| get("OPENAI_API_KEY"));
        let default_dimensions = match config.embedding.provider {
            EmbeddingProvider::Http => DEFAULT_HTTP_DIMENSIONS,
            EmbeddingProvider::Hashing => DEFAULT_HASHING_DIMENSIONS,
        };
        config.embedding.dimensions =
            parse_number(&get, "EMBEDDING_DIMENSIONS", default_dimensions)?;
        config.embedding.request_timeout =
            Duration::from_secs(parse_number(&get, "EMBEDDING_TIMEOUT_SECS", 30u64)?);
        config.embedding.retry = RetryConfig {
            max_retries: parse_number(&get, "EMBEDDING_MAX_RETRIES", 3u32)?,
            ..RetryConfig::default()
        };

        // Logging
        if let Some(value) = get("LOG_FORMAT") {
            config.logging.format = match value.trim().to_ascii_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => {
                    return Err(AppError::Config(format!(
                        "LOG_FORMAT must be 'pretty' or 'json', got '{value}'"
                    )))
                }
            };
        }
        if let Some(value) = get("LOG_LEVEL") {
            config.logging.level = value.trim().to_ascii_lowercase();
        }

        Ok(config)
    }

    /// Validate the complete configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.input_dir.as_os_str().is_empty() {
            return Err(AppError::Config("EVAL_INPUT_DIR cannot be empty".to_string()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(AppError::Config("EVAL_OUTPUT_DIR cannot be empty".to_string()));
        }
        if self.pipeline.limits.max_dimension == 0 {
            return Err(AppError::Config(
                "EVAL_MAX_DIMENSION must be greater than 0".to_string(),
            ));
        }
        self.pipeline
            .weights
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        self.ocr.validate()?;

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "EMBEDDING_DIMENSIONS must be greater than 0".to_string(),
            ));
        }
        if self.embedding.provider == EmbeddingProvider::Http {
            if self.embedding.api_key.is_none() {
                return Err(AppError::Config(
                    "EMBEDDING_API_KEY (or OPENAI_API_KEY) is required when EMBEDDING_PROVIDER=http"
                        .to_string(),
                ));
            }
            if self.embedding.request_timeout.is_zero() {
                return Err(AppError::Config(
                    "EMBEDDING_TIMEOUT_SECS cannot be 0".to_string(),
                ));
            }
        }

        self.logging.validate()
    }
}

fn parse_number<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> AppResult<T> {
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} must be a valid number, got '{value}'"))),
        None => Ok(default),
    }
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> AppResult<bool> {
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(value) => match value.as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(AppError::Config(format!("{key} must be true or false, got '{value}'"))),
        },
        None => Ok(default),
    }
}

//! # Configuration Tests
//!
//! Loading the run configuration from a variable table, the way the binary
//! does from the process environment.

#[cfg(test)]
mod tests {
    use ocr_strategy_eval::config::{EvalConfig, LogFormat};
    use ocr_strategy_eval::embedding::EmbeddingProvider;
    use ocr_strategy_eval::errors::AppError;
    use ocr_strategy_eval::normalization::MissingMetricPolicy;
    use ocr_strategy_eval::ocr_config::{ModelType, PageSegMode};
    use ocr_strategy_eval::similarity::SimilarityReduction;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn from_table(vars: &[(&str, &str)]) -> Result<EvalConfig, AppError> {
        let table: HashMap<&str, &str> = vars.iter().copied().collect();
        EvalConfig::from_lookup(|key| table.get(key).map(|v| v.to_string()))
    }

    /// Test a fully specified environment
    #[test]
    fn test_full_environment() {
        let config = from_table(&[
            ("EVAL_INPUT_DIR", "/data/scans"),
            ("EVAL_OUTPUT_DIR", "/data/results"),
            ("EVAL_MAX_DIMENSION", "1200"),
            ("EVAL_PARALLEL_IMAGES", "true"),
            ("EVAL_MISSING_METRIC_POLICY", "worst_case"),
            ("EVAL_SIMILARITY_REDUCTION", "reference"),
            ("EVAL_WEIGHT_SIMILARITY", "0.6"),
            ("EVAL_WEIGHT_TIME", "0.2"),
            ("EVAL_WEIGHT_MEMORY", "0.2"),
            ("OCR_LANGUAGES", "eng+fra"),
            ("OCR_PSM", "6"),
            ("OCR_MODEL", "best"),
            ("EMBEDDING_PROVIDER", "http"),
            ("EMBEDDING_BASE_URL", "http://localhost:8080/v1"),
            ("EMBEDDING_MODEL", "local-embed"),
            ("EMBEDDING_API_KEY", "secret"),
            ("EMBEDDING_DIMENSIONS", "768"),
            ("EMBEDDING_MAX_RETRIES", "5"),
            ("LOG_FORMAT", "json"),
            ("LOG_LEVEL", "DEBUG"),
        ])
        .unwrap();

        assert_eq!(config.input_dir, PathBuf::from("/data/scans"));
        assert_eq!(config.output_dir, PathBuf::from("/data/results"));
        assert_eq!(config.pipeline.limits.max_dimension, 1200);
        assert!(config.pipeline.parallel_images);
        assert_eq!(config.pipeline.missing_metric_policy, MissingMetricPolicy::WorstCase);
        assert_eq!(config.pipeline.similarity_reduction, SimilarityReduction::Reference);
        assert_eq!(config.pipeline.weights.similarity, 0.6);
        assert_eq!(config.ocr.languages, "eng+fra");
        assert_eq!(config.ocr.psm_mode, PageSegMode::SingleBlock);
        assert_eq!(config.ocr.model_type, ModelType::Best);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Http);
        assert_eq!(config.embedding.base_url, "http://localhost:8080/v1");
        assert_eq!(config.embedding.model, "local-embed");
        assert_eq!(config.embedding.dimensions, 768);
        assert_eq!(config.embedding.retry.max_retries, 5);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = from_table(&[("EVAL_INPUT_DIR", "  "), ("OCR_LANGUAGES", "")]).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("./input"));
        assert_eq!(config.ocr.languages, "eng");
    }

    #[test]
    fn test_explicit_key_wins_over_openai_key() {
        let config = from_table(&[
            ("EMBEDDING_PROVIDER", "http"),
            ("EMBEDDING_API_KEY", "primary"),
            ("OPENAI_API_KEY", "fallback"),
        ])
        .unwrap();
        assert_eq!(config.embedding.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_http_provider_requires_key() {
        let config = from_table(&[("EMBEDDING_PROVIDER", "http")]).unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_unknown_enum_values_rejected() {
        for (key, value) in [
            ("EVAL_MISSING_METRIC_POLICY", "ignore"),
            ("EVAL_SIMILARITY_REDUCTION", "median"),
            ("OCR_PSM", "99"),
            ("OCR_MODEL", "huge"),
            ("EMBEDDING_PROVIDER", "carrier-pigeon"),
        ] {
            let err = from_table(&[(key, value)]).unwrap_err();
            assert!(err.to_string().contains(key), "{key}: {err}");
        }
    }

    #[test]
    fn test_zero_max_dimension_fails_validation() {
        let config = from_table(&[("EVAL_MAX_DIMENSION", "0")]).unwrap();
        assert!(config.validate().is_err());
    }
}

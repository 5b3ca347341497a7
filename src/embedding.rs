//! # Embedding Module
//!
//! Turns each strategy's aggregated text into a vector.
//!
//! The [`Embedder`] trait is the collaborator boundary. Two providers are included:
//!
//! - [`HttpEmbedder`]: any OpenAI-compatible `/embeddings` endpoint, with retries
//!   and exponential backoff for transient failures
//! - [`HashingEmbedder`]: a deterministic local bag-of-words embedding that needs no
//!   network and no model download
//!
//! [`EmbeddingAggregator`] applies the batch policy: empty text is never embedded,
//! a failure drops only the affected strategy, and every vector of a run must have
//! the same length.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};

use crate::errors::error_logging;
use crate::strategy::{DroppedStrategy, StrategyId};

pub const DEFAULT_HTTP_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_HTTP_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_HTTP_DIMENSIONS: usize = 1536;
pub const DEFAULT_HASHING_DIMENSIONS: usize = 512;

/// Errors raised by embedding providers
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    /// Provider misconfiguration (missing key, bad URL, zero dimension)
    Config(String),
    /// The request could not be sent or timed out
    Request(String),
    /// The provider answered with an error status
    Response { status: u16, message: String },
    /// The provider answered but the payload held no usable vector
    Empty(String),
    /// The vector length differs from the one fixed for the run
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Network failures, rate limiting and server errors are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            EmbeddingError::Request(_) => true,
            EmbeddingError::Response { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for EmbeddingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingError::Config(msg) => write!(f, "[EMBEDDING_CONFIG] {}", msg),
            EmbeddingError::Request(msg) => write!(f, "[EMBEDDING_REQUEST] {}", msg),
            EmbeddingError::Response { status, message } => {
                write!(f, "[EMBEDDING_RESPONSE] HTTP {}: {}", status, message)
            }
            EmbeddingError::Empty(msg) => write!(f, "[EMBEDDING_EMPTY] {}", msg),
            EmbeddingError::DimensionMismatch { expected, actual } => write!(
                f,
                "[EMBEDDING_DIMENSION] Expected vector of length {}, got {}",
                expected, actual
            ),
        }
    }
}

impl std::error::Error for EmbeddingError {}

/// External embedding collaborator
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate the embedding of one text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Expected vector length
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Which embedding backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    Hashing,
    Http,
}

impl EmbeddingProvider {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hashing" | "local" => Some(Self::Hashing),
            "http" | "openai" => Some(Self::Http),
            _ => None,
        }
    }
}

/// Retry behaviour for transient HTTP failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 10_000,
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimensions: usize,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hashing,
            base_url: DEFAULT_HTTP_BASE_URL.to_string(),
            model: DEFAULT_HTTP_MODEL.to_string(),
            api_key: None,
            dimensions: DEFAULT_HASHING_DIMENSIONS,
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

/// Build the configured provider
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    match config.provider {
        EmbeddingProvider::Hashing => Ok(Arc::new(HashingEmbedder::new(config.dimensions)?)),
        EmbeddingProvider::Http => Ok(Arc::new(HttpEmbedder::new(config.clone())?)),
    }
}

/// Exponential backoff delay in milliseconds for the given 1-based attempt, with
/// up to 25% random jitter.
pub fn calculate_retry_delay(attempt: u32, retry: &RetryConfig) -> u64 {
    let exponent = attempt.saturating_sub(1).min(16);
    let exponential = retry.base_retry_delay_ms.saturating_mul(1u64 << exponent);
    let delay = exponential.min(retry.max_retry_delay_ms);

    let jitter_range = delay / 4;
    let jitter = if jitter_range > 0 {
        rand::random::<u64>() % jitter_range
    } else {
        0
    };
    delay + jitter
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

/// Accept a provider vector only if it has the configured length
fn check_dimension(vector: Vec<f32>, expected: usize) -> Result<Vec<f32>, EmbeddingError> {
    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(vector)
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI-compatible HTTP embedding provider
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: EmbeddingConfig,
    api_key: String,
}

impl HttpEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                EmbeddingError::Config(
                    "EMBEDDING_API_KEY (or OPENAI_API_KEY) is required for the http provider"
                        .to_string(),
                )
            })?;
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(EmbeddingError::Config(format!(
                "Invalid embedding base URL: {}",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EmbeddingError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }

    async fn request_once(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.config.model,
                input: text,
                dimensions: self.config.dimensions,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Response {
                status: status.as_u16(),
                message,
            });
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Empty(format!("Malformed embedding response: {e}")))?;

        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EmbeddingError::Empty("Response contained no embedding".to_string()))?;
        check_dimension(vector, self.config.dimensions)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let start = Instant::now();
        let max_attempts = self.config.retry.max_retries + 1;
        let mut attempt = 1;

        loop {
            match self.request_once(text).await {
                Ok(vector) => {
                    crate::observability::record_embedding_request(true, start.elapsed(), attempt);
                    return Ok(vector);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = calculate_retry_delay(attempt, &self.config.retry);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay,
                        error = %e,
                        "Transient embedding failure, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(e) => {
                    crate::observability::record_embedding_request(false, start.elapsed(), attempt);
                    return Err(e);
                }
            }
        }
    }

    fn dimension(&self) -> usize {
        self.config.dimensions
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

impl fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Deterministic local embedding by feature hashing.
///
/// Text is lower-cased and split on non-alphanumeric characters; every token is
/// hashed with FNV-1a into one of `dimension` buckets, with the top hash bit
/// choosing the sign. The result is L2-normalized. Empty text gives the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_name: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::Config(
                "Embedding dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            model_name: format!("hashing-{dimension}"),
        })
    }

    /// Synchronous embedding, shared by the async trait method
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimension];
        let lowered = text.to_lowercase();

        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_text(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Result of embedding a batch of aggregated texts
#[derive(Debug, Clone, Default)]
pub struct EmbeddingOutcome {
    /// Catalogue order, only strategies that were embedded successfully
    pub embeddings: IndexMap<StrategyId, Vec<f32>>,
    pub dropped: Vec<DroppedStrategy>,
    /// Vector length fixed by the first successful embedding
    pub dimension: Option<usize>,
}

/// Sends each strategy's text to the embedder, one strategy at a time.
#[derive(Clone)]
pub struct EmbeddingAggregator {
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingAggregator {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub async fn embed(&self, texts: &IndexMap<StrategyId, String>) -> EmbeddingOutcome {
        let mut outcome = EmbeddingOutcome::default();
        let model = self.embedder.model_name().to_string();

        for (strategy, text) in texts {
            if text.trim().is_empty() {
                outcome.dropped.push(DroppedStrategy::record(
                    strategy,
                    "embedding",
                    "no text was extracted",
                ));
                continue;
            }

            let span = crate::observability::embedding_span(strategy.as_str(), &model);
            match self.embedder.embed(text).instrument(span).await {
                Ok(vector) => match outcome.dimension {
                    Some(expected) if expected != vector.len() => {
                        let err = EmbeddingError::DimensionMismatch {
                            expected,
                            actual: vector.len(),
                        };
                        error_logging::log_embedding_error(&err, strategy.as_str(), &model, None);
                        crate::observability::record_strategy_failure(strategy.as_str(), "embedding");
                        outcome.dropped.push(DroppedStrategy::record(
                            strategy,
                            "embedding",
                            err.to_string(),
                        ));
                    }
                    _ => {
                        debug!(strategy = %strategy, dimension = vector.len(), "Embedding generated");
                        outcome.dimension = Some(vector.len());
                        outcome.embeddings.insert(strategy.clone(), vector);
                    }
                },
                Err(err) => {
                    error_logging::log_embedding_error(&err, strategy.as_str(), &model, None);
                    crate::observability::record_strategy_failure(strategy.as_str(), "embedding");
                    outcome.dropped.push(DroppedStrategy::record(
                        strategy,
                        "embedding",
                        err.to_string(),
                    ));
                }
            }
        }

        info!(
            embedded = outcome.embeddings.len(),
            dropped = outcome.dropped.len(),
            model = %model,
            "Embedding stage completed"
        );
        outcome
    }
}

impl fmt::Debug for EmbeddingAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingAggregator")
            .field("model", &self.embedder.model_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{BuiltinStrategy, StrategyCatalogue};

    /// Fails for texts containing "fail", returns a short vector for "short"
    struct ScriptedEmbedder;

    #[async_trait]
    impl Embedder for ScriptedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text.contains("fail") {
                Err(EmbeddingError::Request("connection reset".to_string()))
            } else if text.contains("short") {
                Ok(vec![1.0])
            } else {
                Ok(vec![1.0, 0.0, 0.0])
            }
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn texts(values: &[&str]) -> IndexMap<StrategyId, String> {
        let mut catalogue = StrategyCatalogue::new();
        let builtins = [
            BuiltinStrategy::Grayscale,
            BuiltinStrategy::OtsuThreshold,
            BuiltinStrategy::Deskew,
            BuiltinStrategy::GlobalThreshold(128),
        ];
        values
            .iter()
            .zip(builtins)
            .map(|(text, builtin)| (catalogue.register_builtin(builtin).unwrap(), text.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_aggregator_skips_empty_and_drops_failures() {
        let aggregator = EmbeddingAggregator::new(Arc::new(ScriptedEmbedder));
        let outcome = aggregator.embed(&texts(&["hello", "  \n ", "please fail"])).await;

        assert_eq!(outcome.embeddings.len(), 1);
        assert!(outcome.embeddings.contains_key("Grayscale"));
        let dropped: Vec<&str> = outcome.dropped.iter().map(|d| d.strategy.as_str()).collect();
        assert_eq!(dropped, vec!["OtsuThreshold", "Deskewed"]);
        assert_eq!(outcome.dimension, Some(3));
    }

    #[tokio::test]
    async fn test_aggregator_enforces_consistent_dimension() {
        let aggregator = EmbeddingAggregator::new(Arc::new(ScriptedEmbedder));
        let outcome = aggregator.embed(&texts(&["hello", "short", "world"])).await;

        assert_eq!(outcome.embeddings.len(), 2);
        assert!(!outcome.embeddings.contains_key("OtsuThreshold"));
        assert!(outcome.dropped[0].reason.contains("length 3"));
    }

    #[test]
    fn test_dimension_mismatch_counts_as_strategy_failure() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let texts = texts(&["hello", "short"]);

        let outcome = ::metrics::with_local_recorder(&recorder, || {
            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
                .block_on(EmbeddingAggregator::new(Arc::new(ScriptedEmbedder)).embed(&texts))
        });

        assert_eq!(outcome.dropped.len(), 1);
        let rendered = handle.render();
        let failure = rendered
            .lines()
            .find(|line| line.starts_with("strategy_failures_total{"))
            .unwrap();
        assert!(failure.contains(r#"strategy="OtsuThreshold""#), "{failure}");
        assert!(failure.contains(r#"stage="embedding""#), "{failure}");
        assert!(failure.ends_with(" 1"), "{failure}");
    }

    #[tokio::test]
    async fn test_hashing_embedder_is_deterministic() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let a = embedder.embed("Hello, WORLD").await.unwrap();
        let b = embedder.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_embedder_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16).unwrap();
        assert!(embedder.embed_text(" ,;; ").iter().all(|v| *v == 0.0));
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn test_retry_delay_grows_and_is_capped() {
        let retry = RetryConfig {
            max_retries: 5,
            base_retry_delay_ms: 100,
            max_retry_delay_ms: 1000,
        };
        let first = calculate_retry_delay(1, &retry);
        let third = calculate_retry_delay(3, &retry);
        let tenth = calculate_retry_delay(10, &retry);
        assert!((100..125).contains(&first));
        assert!((400..500).contains(&third));
        assert!((1000..1250).contains(&tenth));

        let tiny = RetryConfig { base_retry_delay_ms: 1, ..retry };
        assert_eq!(calculate_retry_delay(1, &tiny), 1);
    }

    #[test]
    fn test_transient_classification() {
        assert!(EmbeddingError::Request("timeout".into()).is_transient());
        assert!(EmbeddingError::Response { status: 429, message: String::new() }.is_transient());
        assert!(EmbeddingError::Response { status: 503, message: String::new() }.is_transient());
        assert!(!EmbeddingError::Response { status: 401, message: String::new() }.is_transient());
        assert!(!EmbeddingError::Empty("x".into()).is_transient());
    }

    #[test]
    fn test_http_embedder_requires_api_key() {
        let config = EmbeddingConfig {
            provider: EmbeddingProvider::Http,
            ..EmbeddingConfig::default()
        };
        assert!(matches!(HttpEmbedder::new(config.clone()), Err(EmbeddingError::Config(_))));

        let with_key = EmbeddingConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "http://localhost:8080/v1/".to_string(),
            ..config
        };
        let embedder = HttpEmbedder::new(with_key).unwrap();
        assert_eq!(embedder.endpoint(), "http://localhost:8080/v1/embeddings");
    }

    #[test]
    fn test_http_request_carries_configured_dimension() {
        let body = serde_json::to_value(EmbeddingRequest {
            model: DEFAULT_HTTP_MODEL,
            input: "HELLO",
            dimensions: 256,
        })
        .unwrap();
        assert_eq!(body["dimensions"], 256);
        assert_eq!(body["model"], DEFAULT_HTTP_MODEL);
    }

    #[test]
    fn test_provider_vector_must_match_configured_dimension() {
        assert_eq!(check_dimension(vec![0.5; 4], 4).unwrap().len(), 4);
        assert_eq!(
            check_dimension(vec![0.5; 3], 4),
            Err(EmbeddingError::DimensionMismatch { expected: 4, actual: 3 })
        );
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(EmbeddingProvider::parse("HTTP"), Some(EmbeddingProvider::Http));
        assert_eq!(EmbeddingProvider::parse("hashing"), Some(EmbeddingProvider::Hashing));
        assert_eq!(EmbeddingProvider::parse("bert"), None);
    }
}

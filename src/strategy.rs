//! # Strategy Catalogue Module
//!
//! A strategy is a named preprocessing transform. The [`StrategyCatalogue`] is the
//! only producer of [`StrategyId`] values; every downstream structure (measurements,
//! aggregated text, embeddings, similarity, scores, ranking) is keyed by the same
//! identifier, and the catalogue's registration order is the tie-break order for
//! ranking.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use image::DynamicImage;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::preprocessing::{self, PreprocessingError};

lazy_static! {
    static ref STRATEGY_NAME_PATTERN: Regex =
        Regex::new(r"^[A-Za-z0-9_.+\-]+$").expect("Invalid strategy name regex pattern");
}

/// Shared identifier of a registered strategy.
///
/// Cloning is a reference-count bump. Compares and hashes like the underlying name,
/// so maps keyed by `StrategyId` can be queried with a `&str`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrategyId(Arc<str>);

impl StrategyId {
    fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl fmt::Debug for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StrategyId({:?})", &*self.0)
    }
}

impl Borrow<str> for StrategyId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Serialize for StrategyId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// A pure image-to-image transform. Implementations must not mutate their input.
pub trait Transform: Send + Sync {
    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, PreprocessingError>;
}

impl<F> Transform for F
where
    F: Fn(&DynamicImage) -> Result<DynamicImage, PreprocessingError> + Send + Sync,
{
    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, PreprocessingError> {
        self(image)
    }
}

/// The built-in preprocessing transforms, with their parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuiltinStrategy {
    Grayscale,
    AdaptiveThreshold { block_size: u32, offset: f64 },
    GlobalThreshold(u8),
    OtsuThreshold,
    Shift { dx: i32, dy: i32 },
    Saturation(f32),
    Deskew,
    GaussianBlur(f32),
    MedianFilter(u32),
    Contrast(f32),
}

impl BuiltinStrategy {
    pub const DEFAULT_ADAPTIVE_BLOCK_SIZE: u32 = 11;
    pub const DEFAULT_ADAPTIVE_OFFSET: f64 = 5.0;

    /// Canonical strategy name, with parameters baked in where they vary.
    pub fn name(&self) -> String {
        match *self {
            Self::Grayscale => "Grayscale".to_string(),
            Self::AdaptiveThreshold { block_size, offset }
                if block_size == Self::DEFAULT_ADAPTIVE_BLOCK_SIZE
                    && offset == Self::DEFAULT_ADAPTIVE_OFFSET =>
            {
                "AdaptiveThreshold".to_string()
            }
            Self::AdaptiveThreshold { block_size, offset } => {
                format!("AdaptiveThreshold_{block_size}_{offset}")
            }
            Self::GlobalThreshold(threshold) => format!("GlobalThreshold_{threshold}"),
            Self::OtsuThreshold => "OtsuThreshold".to_string(),
            Self::Shift { dx, dy } => format!("Shifted_{dx}_{dy}"),
            Self::Saturation(factor) => format!("SaturationAdjusted_{factor}"),
            Self::Deskew => "Deskewed".to_string(),
            Self::GaussianBlur(sigma) => format!("GaussianBlur_{sigma}"),
            Self::MedianFilter(radius) => format!("MedianFilter_{radius}"),
            Self::Contrast(contrast) => format!("Contrast_{contrast}"),
        }
    }
}

impl Transform for BuiltinStrategy {
    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, PreprocessingError> {
        match *self {
            Self::Grayscale => preprocessing::convert_to_grayscale(image),
            Self::AdaptiveThreshold { block_size, offset } => {
                preprocessing::apply_adaptive_threshold(image, block_size, offset)
            }
            Self::GlobalThreshold(threshold) => {
                preprocessing::apply_global_threshold(image, threshold)
            }
            Self::OtsuThreshold => preprocessing::apply_otsu_threshold(image).map(|(img, _)| img),
            Self::Shift { dx, dy } => preprocessing::shift_image(image, dx, dy),
            Self::Saturation(factor) => preprocessing::adjust_saturation(image, factor),
            Self::Deskew => preprocessing::apply_deskew(image),
            Self::GaussianBlur(sigma) => preprocessing::apply_gaussian_blur(image, sigma),
            Self::MedianFilter(radius) => preprocessing::apply_median_filter(image, radius),
            Self::Contrast(contrast) => preprocessing::adjust_contrast(image, contrast),
        }
    }
}

/// Errors raised while populating a catalogue.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogueError {
    DuplicateName(String),
    InvalidName(String),
}

impl fmt::Display for CatalogueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogueError::DuplicateName(name) => {
                write!(f, "[CATALOGUE] Strategy '{}' is already registered", name)
            }
            CatalogueError::InvalidName(name) => write!(
                f,
                "[CATALOGUE] Invalid strategy name '{}': use letters, digits and _ . + -",
                name
            ),
        }
    }
}

impl std::error::Error for CatalogueError {}

/// A strategy removed from the downstream stages of a run, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedStrategy {
    pub strategy: StrategyId,
    pub stage: &'static str,
    pub reason: String,
}

impl DroppedStrategy {
    /// Build the record and log it.
    pub fn record(strategy: &StrategyId, stage: &'static str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        crate::errors::error_logging::log_strategy_dropped(strategy.as_str(), stage, &reason);
        Self {
            strategy: strategy.clone(),
            stage,
            reason,
        }
    }
}

/// One catalogue entry.
#[derive(Clone)]
pub struct Strategy {
    id: StrategyId,
    transform: Arc<dyn Transform>,
}

impl Strategy {
    pub fn id(&self) -> &StrategyId {
        &self.id
    }

    pub fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, PreprocessingError> {
        self.transform.apply(image)
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Ordered registry of strategies. Read-only once handed to a pipeline run, and
/// safe to share across the threads that process images in parallel.
#[derive(Debug, Clone, Default)]
pub struct StrategyCatalogue {
    strategies: Vec<Strategy>,
}

impl StrategyCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transform under `name`, returning its identifier.
    pub fn register(
        &mut self,
        name: &str,
        transform: impl Transform + 'static,
    ) -> Result<StrategyId, CatalogueError> {
        if !STRATEGY_NAME_PATTERN.is_match(name) {
            return Err(CatalogueError::InvalidName(name.to_string()));
        }
        if self.get(name).is_some() {
            return Err(CatalogueError::DuplicateName(name.to_string()));
        }

        let id = StrategyId::new(name);
        self.strategies.push(Strategy {
            id: id.clone(),
            transform: Arc::new(transform),
        });
        Ok(id)
    }

    /// Register a built-in transform under its canonical name.
    pub fn register_builtin(
        &mut self,
        builtin: BuiltinStrategy,
    ) -> Result<StrategyId, CatalogueError> {
        self.register(&builtin.name(), builtin)
    }

    pub fn get(&self, name: &str) -> Option<&Strategy> {
        self.strategies.iter().find(|s| s.id.as_str() == name)
    }

    /// Registration index, used as the ranking tie-break key.
    pub fn position(&self, id: &StrategyId) -> Option<usize> {
        self.strategies.iter().position(|s| &s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Strategy> {
        self.strategies.iter()
    }

    pub fn ids(&self) -> Vec<StrategyId> {
        self.strategies.iter().map(|s| s.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// The strategies compared by default, in ranking tie-break order.
pub fn default_strategies() -> Vec<BuiltinStrategy> {
    vec![
        BuiltinStrategy::Grayscale,
        BuiltinStrategy::AdaptiveThreshold {
            block_size: BuiltinStrategy::DEFAULT_ADAPTIVE_BLOCK_SIZE,
            offset: BuiltinStrategy::DEFAULT_ADAPTIVE_OFFSET,
        },
        BuiltinStrategy::GlobalThreshold(128),
        BuiltinStrategy::OtsuThreshold,
        BuiltinStrategy::Shift { dx: 5, dy: 5 },
        BuiltinStrategy::Saturation(1.2),
        BuiltinStrategy::Deskew,
        BuiltinStrategy::GaussianBlur(1.5),
        BuiltinStrategy::MedianFilter(1),
        BuiltinStrategy::Contrast(20.0),
    ]
}

/// Build a catalogue holding [`default_strategies`].
pub fn default_catalogue() -> Result<StrategyCatalogue, CatalogueError> {
    let mut catalogue = StrategyCatalogue::new();
    for builtin in default_strategies() {
        catalogue.register_builtin(builtin)?;
    }
    Ok(catalogue)
}

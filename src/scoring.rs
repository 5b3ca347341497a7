//! # Composite Scoring Module
//!
//! Weighted sum of the normalized metrics. Defaults weight semantic fidelity over
//! speed, and speed over memory footprint.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::normalization::NormalizedMetricSet;
use crate::strategy::StrategyId;

pub const DEFAULT_SIMILARITY_WEIGHT: f64 = 0.5;
pub const DEFAULT_TIME_WEIGHT: f64 = 0.3;
pub const DEFAULT_MEMORY_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, PartialEq)]
pub struct InvalidWeights(pub String);

impl fmt::Display for InvalidWeights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[SCORING] Invalid weights: {}", self.0)
    }
}

impl std::error::Error for InvalidWeights {}

/// Weights of the composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreWeights {
    pub similarity: f64,
    pub time: f64,
    pub memory: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            similarity: DEFAULT_SIMILARITY_WEIGHT,
            time: DEFAULT_TIME_WEIGHT,
            memory: DEFAULT_MEMORY_WEIGHT,
        }
    }
}

impl ScoreWeights {
    /// Build validated weights
    pub fn new(similarity: f64, time: f64, memory: f64) -> Result<Self, InvalidWeights> {
        let weights = Self {
            similarity,
            time,
            memory,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Weights must be finite, non-negative and not all zero
    pub fn validate(&self) -> Result<(), InvalidWeights> {
        let all = [
            ("similarity", self.similarity),
            ("time", self.time),
            ("memory", self.memory),
        ];
        for (name, value) in all {
            if !value.is_finite() || value < 0.0 {
                return Err(InvalidWeights(format!(
                    "{name} weight must be a finite non-negative number, got {value}"
                )));
            }
        }
        if all.iter().all(|(_, value)| *value == 0.0) {
            return Err(InvalidWeights("at least one weight must be positive".to_string()));
        }
        Ok(())
    }

    pub fn sum(&self) -> f64 {
        self.similarity + self.time + self.memory
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompositeScorer {
    weights: ScoreWeights,
}

impl CompositeScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    pub fn score(&self, set: &NormalizedMetricSet) -> f64 {
        self.weights.similarity * set.similarity
            + self.weights.time * set.time
            + self.weights.memory * set.memory
    }

    /// Score every strategy, keeping the input order
    pub fn score_all(
        &self,
        normalized: &IndexMap<StrategyId, NormalizedMetricSet>,
    ) -> IndexMap<StrategyId, f64> {
        normalized
            .iter()
            .map(|(id, set)| (id.clone(), self.score(set)))
            .collect()
    }
}

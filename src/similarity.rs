//! # Similarity Module
//!
//! Pairwise cosine similarity between strategy embeddings, and the reduction of
//! the matrix to one similarity score per strategy.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::strategy::StrategyId;

/// Cosine similarity clamped to `[0, 1]`.
///
/// Returns exactly `0.0` when either vector has zero magnitude or the lengths
/// differ. Negative cosine is clamped to `0.0`.
///
/// # Examples
///
/// ```
/// use ocr_strategy_eval::similarity::cosine_similarity;
///
/// assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), 0.0);
/// assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-9);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0f64, 0f64, 0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    if similarity.is_finite() {
        similarity.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// How the matrix is reduced to one score per strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityReduction {
    /// Mean of the strategy's row, excluding the diagonal
    #[default]
    MeanOfOthers,
    /// Similarity to the first strategy of the matrix
    Reference,
}

impl SimilarityReduction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mean_of_others" | "mean" => Some(Self::MeanOfOthers),
            "reference" | "first" => Some(Self::Reference),
            _ => None,
        }
    }
}

/// Square similarity matrix in catalogue order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimilarityMatrix {
    strategies: Vec<StrategyId>,
    values: Vec<Vec<f64>>,
}

impl SimilarityMatrix {
    /// Compute every ordered pair, diagonal included.
    ///
    /// Fewer than two strategies give an empty matrix; comparison is undefined.
    pub fn build(embeddings: &IndexMap<StrategyId, Vec<f32>>) -> Self {
        if embeddings.len() < 2 {
            info!(
                strategies = embeddings.len(),
                "Fewer than two embedded strategies, similarity comparison skipped"
            );
            return Self::default();
        }

        let strategies: Vec<StrategyId> = embeddings.keys().cloned().collect();
        let vectors: Vec<&Vec<f32>> = embeddings.values().collect();
        let n = vectors.len();

        let mut values = vec![vec![0f64; n]; n];
        for i in 0..n {
            for j in i..n {
                let similarity = cosine_similarity(vectors[i], vectors[j]);
                values[i][j] = similarity;
                values[j][i] = similarity;
            }
        }

        Self { strategies, values }
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn strategies(&self) -> &[StrategyId] {
        &self.strategies
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        Some(self.values[i][j])
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.strategies.iter().position(|s| s.as_str() == name)
    }

    /// One similarity score per strategy, in matrix order.
    pub fn reduce(&self, reduction: SimilarityReduction) -> IndexMap<StrategyId, f64> {
        let n = self.strategies.len();
        self.strategies
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let score = match reduction {
                    SimilarityReduction::MeanOfOthers => {
                        let others: f64 = (0..n).filter(|&j| j != i).map(|j| self.values[i][j]).sum();
                        others / (n - 1) as f64
                    }
                    SimilarityReduction::Reference => self.values[i][0],
                };
                (id.clone(), score)
            })
            .collect()
    }
}

/// Matrix and per-strategy similarity for one run.
///
/// A lone embedded strategy gets an empty matrix but keeps its self-similarity
/// of 1, so it can still be ranked.
pub fn strategy_similarity(
    embeddings: &IndexMap<StrategyId, Vec<f32>>,
    reduction: SimilarityReduction,
) -> (SimilarityMatrix, IndexMap<StrategyId, f64>) {
    let matrix = SimilarityMatrix::build(embeddings);
    let reduced = match embeddings.keys().next() {
        Some(only) if embeddings.len() == 1 => {
            info!(strategy = %only, "Single embedded strategy, using self-similarity");
            IndexMap::from([(only.clone(), 1.0)])
        }
        _ => matrix.reduce(reduction),
    };
    (matrix, reduced)
}

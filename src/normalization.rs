//! # Metric Normalization Module
//!
//! Rescales similarity, time and memory onto `[0, 1]` so unlike units can be
//! weighted together. Similarity is a benefit (`raw / max`); time and memory are
//! costs (`1 - raw / max`). Degenerate ranges are defined outcomes, never errors:
//! a cost metric with no spread across the candidates scores 1 for all of them.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::strategy::{DroppedStrategy, StrategyId};

/// What to do with a strategy that lacks one of the three metrics.
///
/// One policy applies to the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingMetricPolicy {
    /// Drop the strategy from ranking and record why
    #[default]
    Exclude,
    /// Keep the strategy; each missing metric normalizes to 0
    WorstCase,
}

impl MissingMetricPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exclude" => Some(Self::Exclude),
            "worst_case" | "worst-case" | "worstcase" => Some(Self::WorstCase),
            _ => None,
        }
    }
}

/// Normalized metrics of one strategy, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedMetricSet {
    pub similarity: f64,
    /// Higher is faster
    pub time: f64,
    /// Higher is lighter
    pub memory: f64,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizationOutcome {
    pub normalized: IndexMap<StrategyId, NormalizedMetricSet>,
    pub dropped: Vec<DroppedStrategy>,
}

/// Benefit normalization: `raw / max`, or 0 everywhere when the max is 0.
pub fn normalize_benefit(raw: f64, max: f64) -> f64 {
    if max > 0.0 {
        (raw / max).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Cost normalization: `1 - raw / max`, or 1 everywhere when `min == max`.
///
/// `min` and `max` span the candidates' floored costs. Negative raw costs
/// (memory released during a transform) count as no cost.
pub fn normalize_cost(raw: f64, min: f64, max: f64) -> f64 {
    if max > min && max > 0.0 {
        (1.0 - raw.max(0.0) / max).clamp(0.0, 1.0)
    } else {
        1.0
    }
}

/// Smallest and largest floored cost, `(0, 0)` when nothing was sampled.
fn cost_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values
        .map(|v| v.max(0.0))
        .fold(None, |range: Option<(f64, f64)>, v| match range {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })
        .unwrap_or((0.0, 0.0))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricNormalizer {
    policy: MissingMetricPolicy,
}

impl MetricNormalizer {
    pub fn new(policy: MissingMetricPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MissingMetricPolicy {
        self.policy
    }

    /// Normalize the metrics of every strategy in `order`.
    ///
    /// Strategies absent from all three maps are not candidates. The maxima are
    /// taken over the strategies that remain after the missing-metric policy.
    pub fn normalize(
        &self,
        order: &[StrategyId],
        similarity: &IndexMap<StrategyId, f64>,
        time: &IndexMap<StrategyId, f64>,
        memory: &IndexMap<StrategyId, f64>,
    ) -> NormalizationOutcome {
        let lookup = |map: &IndexMap<StrategyId, f64>, id: &StrategyId| {
            map.get(id).copied().filter(|v| v.is_finite())
        };

        let mut outcome = NormalizationOutcome::default();
        let mut candidates = Vec::new();

        for id in order {
            let raw = (lookup(similarity, id), lookup(time, id), lookup(memory, id));
            if raw == (None, None, None) {
                continue;
            }

            let missing: Vec<&str> = [("similarity", raw.0), ("time", raw.1), ("memory", raw.2)]
                .iter()
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| *name)
                .collect();

            if !missing.is_empty() && self.policy == MissingMetricPolicy::Exclude {
                outcome.dropped.push(DroppedStrategy::record(
                    id,
                    "normalization",
                    format!("missing metric(s): {}", missing.join(", ")),
                ));
                continue;
            }
            candidates.push((id, raw));
        }

        let max_similarity = candidates
            .iter()
            .filter_map(|(_, raw)| raw.0)
            .fold(0f64, f64::max);
        let (min_time, max_time) = cost_range(candidates.iter().filter_map(|(_, raw)| raw.1));
        let (min_memory, max_memory) = cost_range(candidates.iter().filter_map(|(_, raw)| raw.2));

        debug!(
            max_similarity,
            min_time,
            max_time,
            min_memory,
            max_memory,
            candidates = candidates.len(),
            "Normalizing strategy metrics"
        );

        for (id, (sim, t, mem)) in candidates {
            let set = NormalizedMetricSet {
                similarity: sim.map_or(0.0, |v| normalize_benefit(v, max_similarity)),
                time: t.map_or(0.0, |v| normalize_cost(v, min_time, max_time)),
                memory: mem.map_or(0.0, |v| normalize_cost(v, min_memory, max_memory)),
            };
            outcome.normalized.insert(id.clone(), set);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{BuiltinStrategy, StrategyCatalogue};

    fn ids(n: usize) -> Vec<StrategyId> {
        let mut catalogue = StrategyCatalogue::new();
        (0..n)
            .map(|i| catalogue.register_builtin(BuiltinStrategy::MedianFilter(i as u32 + 1)).unwrap())
            .collect()
    }

    fn map(ids: &[StrategyId], values: &[f64]) -> IndexMap<StrategyId, f64> {
        ids.iter().cloned().zip(values.iter().copied()).collect()
    }

    #[test]
    fn test_time_normalization_inverts_cost() {
        let ids = ids(3);
        let out = MetricNormalizer::default().normalize(
            &ids,
            &map(&ids, &[1.0, 1.0, 1.0]),
            &map(&ids, &[1.0, 2.0, 4.0]),
            &map(&ids, &[0.0, 0.0, 0.0]),
        );
        let times: Vec<f64> = out.normalized.values().map(|s| s.time).collect();
        assert_eq!(times, vec![0.75, 0.5, 0.0]);
    }

    #[test]
    fn test_identical_costs_all_score_one() {
        let ids = ids(2);
        let out = MetricNormalizer::default().normalize(
            &ids,
            &map(&ids, &[0.0, 0.0]),
            &map(&ids, &[0.0, 0.0]),
            &map(&ids, &[-1.0, -3.0]),
        );
        for set in out.normalized.values() {
            assert_eq!(set.time, 1.0);
            assert_eq!(set.memory, 1.0);
            assert_eq!(set.similarity, 0.0);
        }
    }

    #[test]
    fn test_identical_nonzero_costs_all_score_one() {
        let ids = ids(2);
        let out = MetricNormalizer::default().normalize(
            &ids,
            &map(&ids, &[1.0, 1.0]),
            &map(&ids, &[2.0, 2.0]),
            &map(&ids, &[3.0, 3.0]),
        );
        for set in out.normalized.values() {
            assert_eq!(set.similarity, 1.0);
            assert_eq!(set.time, 1.0);
            assert_eq!(set.memory, 1.0);
        }
    }

    #[test]
    fn test_single_candidate_is_not_penalized() {
        let ids = ids(1);
        let out = MetricNormalizer::default().normalize(
            &ids,
            &map(&ids, &[1.0]),
            &map(&ids, &[0.8]),
            &map(&ids, &[12.5]),
        );
        let set = out.normalized[&ids[0]];
        assert_eq!((set.time, set.memory), (1.0, 1.0));
    }

    #[test]
    fn test_similarity_relative_to_max() {
        let ids = ids(2);
        let out = MetricNormalizer::default().normalize(
            &ids,
            &map(&ids, &[0.4, 0.8]),
            &map(&ids, &[1.0, 1.0]),
            &map(&ids, &[1.0, 1.0]),
        );
        assert_eq!(out.normalized[&ids[0]].similarity, 0.5);
        assert_eq!(out.normalized[&ids[1]].similarity, 1.0);
    }

    #[test]
    fn test_exclude_policy_drops_incomplete_strategies() {
        let ids = ids(3);
        let out = MetricNormalizer::new(MissingMetricPolicy::Exclude).normalize(
            &ids,
            &map(&ids[..2], &[1.0, 1.0]),
            &map(&ids, &[1.0, 2.0, 0.5]),
            &map(&ids, &[1.0, 1.0, 1.0]),
        );
        assert_eq!(out.normalized.len(), 2);
        assert_eq!(out.dropped.len(), 1);
        assert_eq!(out.dropped[0].strategy, ids[2]);
        assert!(out.dropped[0].reason.contains("similarity"));
        // max time is taken over ranked strategies only
        assert_eq!(out.normalized[&ids[1]].time, 0.0);
    }

    #[test]
    fn test_worst_case_policy_keeps_incomplete_strategies() {
        let ids = ids(3);
        let out = MetricNormalizer::new(MissingMetricPolicy::WorstCase).normalize(
            &ids,
            &map(&ids[..2], &[1.0, 0.5]),
            &map(&ids, &[1.0, 2.0, 0.5]),
            &map(&ids, &[1.0, 1.0, 1.0]),
        );
        assert_eq!(out.normalized.len(), 3);
        assert!(out.dropped.is_empty());
        assert_eq!(out.normalized[&ids[2]].similarity, 0.0);
        assert_eq!(out.normalized[&ids[2]].time, 0.75);
    }

    #[test]
    fn test_strategies_without_any_metric_are_ignored() {
        let ids = ids(2);
        let empty = IndexMap::new();
        let out = MetricNormalizer::default().normalize(&ids, &empty, &empty, &empty);
        assert!(out.normalized.is_empty());
        assert!(out.dropped.is_empty());
    }

    #[test]
    fn test_values_stay_in_unit_interval() {
        assert_eq!(normalize_benefit(2.0, 1.0), 1.0);
        assert_eq!(normalize_cost(-5.0, 0.0, 2.0), 1.0);
        assert_eq!(normalize_cost(3.0, 0.0, 2.0), 0.0);
        assert_eq!(normalize_cost(3.0, 0.0, 0.0), 1.0);
        assert_eq!(normalize_cost(4.0, 4.0, 4.0), 1.0);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(MissingMetricPolicy::parse("worst_case"), Some(MissingMetricPolicy::WorstCase));
        assert_eq!(MissingMetricPolicy::parse("EXCLUDE"), Some(MissingMetricPolicy::Exclude));
        assert_eq!(MissingMetricPolicy::parse("ignore"), None);
    }
}

//! # Ranking Module
//!
//! Orders strategies by composite score, best first. Ties keep catalogue
//! registration order, so identical inputs always give identical reports.

use indexmap::IndexMap;
use serde::Serialize;

use crate::strategy::StrategyId;

/// One row of the final report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult {
    /// 1-based position
    pub rank: usize,
    pub strategy: StrategyId,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RankingReportBuilder;

impl RankingReportBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Rank `scores`, whose iteration order must be catalogue order.
    pub fn rank(&self, scores: &IndexMap<StrategyId, f64>) -> Vec<RankedResult> {
        let mut entries: Vec<(&StrategyId, f64)> =
            scores.iter().map(|(id, score)| (id, *score)).collect();
        // stable: equal scores keep insertion order
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));

        entries
            .into_iter()
            .enumerate()
            .map(|(i, (id, score))| RankedResult {
                rank: i + 1,
                strategy: id.clone(),
                score,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{default_catalogue, StrategyCatalogue};

    fn scores(values: &[f64]) -> (StrategyCatalogue, IndexMap<StrategyId, f64>) {
        let catalogue = default_catalogue().unwrap();
        let map = catalogue.ids().into_iter().zip(values.iter().copied()).collect();
        (catalogue, map)
    }

    #[test]
    fn test_rank_orders_by_score_descending() {
        let (_, map) = scores(&[0.2, 0.9, 0.5]);
        let ranked = RankingReportBuilder::new().rank(&map);
        let names: Vec<&str> = ranked.iter().map(|r| r.strategy.as_str()).collect();
        assert_eq!(names, vec!["AdaptiveThreshold", "GlobalThreshold_128", "Grayscale"]);
        let ranks: Vec<usize> = ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_ties_follow_catalogue_order() {
        let (_, map) = scores(&[0.7, 0.7, 0.9, 0.7]);
        let ranked = RankingReportBuilder::new().rank(&map);
        let names: Vec<&str> = ranked.iter().map(|r| r.strategy.as_str()).collect();
        assert_eq!(
            names,
            vec!["GlobalThreshold_128", "Grayscale", "AdaptiveThreshold", "OtsuThreshold"]
        );
    }

    #[test]
    fn test_rank_is_deterministic_and_unique() {
        let (catalogue, map) = scores(&[0.5; 10]);
        let first = RankingReportBuilder::new().rank(&map);
        let second = RankingReportBuilder::new().rank(&map);
        assert_eq!(first, second);
        assert_eq!(first.len(), catalogue.len());
        for (i, row) in first.iter().enumerate() {
            assert_eq!(catalogue.position(&row.strategy), Some(i));
        }
    }

    #[test]
    fn test_empty_scores_give_empty_ranking() {
        assert!(RankingReportBuilder::new().rank(&IndexMap::new()).is_empty());
    }
}

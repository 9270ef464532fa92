//! # Branch Statistics
//!
//! Summaries of a jump graph, and a score for how closely two analyses of
//! the same song agree once both have been turned into graphs.
//!
//! ## Score
//!
//! Four component scores in `[0, 1]` are blended into a percentage:
//!
//! | Component | Weight | Full marks down to zero over |
//! |---|---|---|
//! | neighbour histogram | 0.35 | L1 difference of 2 |
//! | branching fraction | 0.25 | difference of 0.25 |
//! | computed threshold | 0.25 | difference of 20 |
//! | median edge distance | 0.15 | difference of 40 |

use crate::graph::JumpGraph;
use serde::Serialize;

const HISTOGRAM_WEIGHT: f64 = 0.35;
const BRANCHING_WEIGHT: f64 = 0.25;
const THRESHOLD_WEIGHT: f64 = 0.25;
const EDGES_WEIGHT: f64 = 0.15;

const HISTOGRAM_SCALE: f64 = 2.0;
const BRANCHING_SCALE: f64 = 0.25;
const THRESHOLD_SCALE: f64 = 20.0;
const EDGES_SCALE: f64 = 40.0;

/// Shape of a jump graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchStats {
    pub total_beats: usize,
    pub computed_threshold: f64,
    /// Share of beats with at least one live edge
    pub branching_fraction: f64,
    /// Share of beats by live-edge count; the last bin collects
    /// everything at or above `max_branches`
    pub neighbor_hist: Vec<f64>,
    /// Median distance over live edges, 0 without any
    pub median_distance: f64,
}

impl BranchStats {
    #[must_use]
    pub fn from_graph(graph: &JumpGraph, max_branches: usize) -> Self {
        let total = graph.total_beats();
        let mut counts = vec![0usize; max_branches + 1];
        let mut branching = 0usize;
        for beat in 0..total {
            let live = graph.live_neighbors(beat).count();
            counts[live.min(max_branches)] += 1;
            if live > 0 {
                branching += 1;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let share = |n: usize| if total == 0 { 0.0 } else { n as f64 / total as f64 };

        let mut distances: Vec<f64> = graph
            .all_edges()
            .iter()
            .filter(|e| !e.deleted)
            .map(|e| e.distance)
            .collect();
        distances.sort_by(f64::total_cmp);

        Self {
            total_beats: total,
            computed_threshold: graph.computed_threshold(),
            branching_fraction: share(branching),
            neighbor_hist: counts.into_iter().map(share).collect(),
            median_distance: median(&distances),
        }
    }
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 1 => sorted[n / 2],
        _ => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
    }
}

/// Per-component agreement, each in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentScores {
    pub threshold: f64,
    pub branching: f64,
    pub histogram: f64,
    pub edges: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Overall agreement as a percentage
    pub similarity: f64,
    pub scores: ComponentScores,
    pub gold: BranchStats,
    pub generated: BranchStats,
}

fn closeness(difference: f64, scale: f64) -> f64 {
    1.0 - (difference / scale).clamp(0.0, 1.0)
}

/// Score how closely `generated` reproduces `gold`
#[must_use]
pub fn compare(gold: BranchStats, generated: BranchStats) -> Comparison {
    let bins = gold.neighbor_hist.len().max(generated.neighbor_hist.len());
    let bin = |hist: &[f64], i: usize| hist.get(i).copied().unwrap_or(0.0);
    let l1: f64 = (0..bins)
        .map(|i| (bin(&gold.neighbor_hist, i) - bin(&generated.neighbor_hist, i)).abs())
        .sum();

    let scores = ComponentScores {
        threshold: closeness(
            (gold.computed_threshold - generated.computed_threshold).abs(),
            THRESHOLD_SCALE,
        ),
        branching: closeness(
            (gold.branching_fraction - generated.branching_fraction).abs(),
            BRANCHING_SCALE,
        ),
        histogram: closeness(l1, HISTOGRAM_SCALE),
        edges: closeness((gold.median_distance - generated.median_distance).abs(), EDGES_SCALE),
    };
    let similarity = 100.0
        * (HISTOGRAM_WEIGHT * scores.histogram
            + BRANCHING_WEIGHT * scores.branching
            + THRESHOLD_WEIGHT * scores.threshold
            + EDGES_WEIGHT * scores.edges);

    Comparison {
        similarity,
        scores,
        gold,
        generated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;

    fn stats(threshold: f64, branching: f64, hist: Vec<f64>, median: f64) -> BranchStats {
        BranchStats {
            total_beats: 10,
            computed_threshold: threshold,
            branching_fraction: branching,
            neighbor_hist: hist,
            median_distance: median,
        }
    }

    #[test]
    fn test_from_graph() {
        let graph = JumpGraph::from_edges(
            4,
            vec![
                Edge::new(1, 0, 2.0),
                Edge::new(3, 0, 4.0),
                Edge::new(3, 1, 6.0),
                Edge { deleted: true, ..Edge::new(2, 0, 1.0) },
            ],
        );
        let s = BranchStats::from_graph(&graph, 1);

        assert_eq!(s.total_beats, 4);
        assert_eq!(s.branching_fraction, 0.5);
        // Beats 0 and 2 have no live edge; 1 has one, 3 has two folded into the last bin.
        assert_eq!(s.neighbor_hist, vec![0.5, 0.5]);
        assert_eq!(s.median_distance, 4.0);
    }

    #[test]
    fn test_empty_graph() {
        let s = BranchStats::from_graph(&JumpGraph::from_edges(0, Vec::new()), 4);
        assert_eq!(s.branching_fraction, 0.0);
        assert_eq!(s.neighbor_hist, vec![0.0; 5]);
        assert_eq!(s.median_distance, 0.0);
    }

    #[test]
    fn test_identical_scores_full_marks() {
        let a = stats(35.0, 0.4, vec![0.6, 0.3, 0.1], 22.0);
        let result = compare(a.clone(), a);
        assert!((result.similarity - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_component_scores() {
        let gold = stats(30.0, 0.5, vec![1.0, 0.0], 10.0);
        let generated = stats(40.0, 0.75, vec![0.0, 1.0], 90.0);
        let result = compare(gold, generated);

        assert!((result.scores.threshold - 0.5).abs() < 1e-9);
        assert!(result.scores.branching.abs() < 1e-9);
        assert!(result.scores.histogram.abs() < 1e-9);
        assert!(result.scores.edges.abs() < 1e-9);
        assert!((result.similarity - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_histograms_of_different_length() {
        let gold = stats(30.0, 0.5, vec![0.5, 0.5], 10.0);
        let generated = stats(30.0, 0.5, vec![0.5, 0.25, 0.25], 10.0);
        let result = compare(gold, generated);

        assert!((result.scores.histogram - 0.75).abs() < 1e-9);
    }
}

//! Beat similarity.
//!
//! Two beats are compared through the segments that overlap them: the
//! segments are paired up position by position and each pair contributes a
//! weighted blend of timbre, pitch, loudness, duration and confidence
//! differences. Lower is more interchangeable.

use crate::analysis::{Quantum, Segment, TrackAnalysis};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Tunable blend of the per-segment feature differences
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceWeights {
    pub timbre: f64,
    pub pitch: f64,
    pub loudness_start: f64,
    pub loudness_max: f64,
    pub duration: f64,
    pub confidence: f64,
    /// Cost of a segment position only one of the beats has, or of two
    /// beats sharing the very same segment
    pub missing_segment_penalty: f64,
    /// Added when the beats sit at different positions inside their bars
    pub position_penalty: f64,
}

impl Default for DistanceWeights {
    fn default() -> Self {
        Self {
            timbre: 1.0,
            pitch: 10.0,
            loudness_start: 1.0,
            loudness_max: 1.0,
            duration: 100.0,
            confidence: 1.0,
            missing_segment_penalty: 100.0,
            position_penalty: 100.0,
        }
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Weighted distance between two segments. Symmetric.
#[must_use]
pub fn segment_distance(a: &Segment, b: &Segment, weights: &DistanceWeights) -> f64 {
    weights.timbre * euclidean(&a.timbre, &b.timbre)
        + weights.pitch * euclidean(&a.pitches, &b.pitches)
        + weights.loudness_start * (a.loudness_start - b.loudness_start).abs()
        + weights.loudness_max * (a.loudness_max - b.loudness_max).abs()
        + weights.duration * (a.duration - b.duration).abs()
        + weights.confidence * (a.confidence - b.confidence).abs()
}

/// Distance between two beats of the same track. Symmetric.
#[must_use]
pub fn beat_distance(a: &Quantum, b: &Quantum, segments: &[Segment], weights: &DistanceWeights) -> f64 {
    let len = a.overlapping_segments.len().max(b.overlapping_segments.len());
    let position = if a.index_in_parent == b.index_in_parent {
        0.0
    } else {
        weights.position_penalty
    };
    if len == 0 {
        return weights.missing_segment_penalty + position;
    }

    let sum: f64 = (0..len)
        .map(|k| match (a.overlapping_segments.get(k), b.overlapping_segments.get(k)) {
            (Some(&sa), Some(&sb)) if sa != sb => segment_distance(&segments[sa], &segments[sb], weights),
            _ => weights.missing_segment_penalty,
        })
        .sum();

    #[allow(clippy::cast_precision_loss)]
    let mean = sum / len as f64;
    mean + position
}

/// Symmetric table of pairwise beat distances, computed once per track
#[derive(Debug, Clone, PartialEq)]
pub struct BeatDistances {
    size: usize,
    values: Vec<f64>,
    weights: DistanceWeights,
}

impl BeatDistances {
    /// Compute the full table. Rows are computed in parallel and collected
    /// in index order, so the result does not depend on scheduling.
    #[must_use]
    pub fn compute(track: &TrackAnalysis, weights: &DistanceWeights) -> Self {
        let beats = &track.beats;
        let size = beats.len();
        let rows: Vec<Vec<f64>> = (0..size)
            .into_par_iter()
            .map(|i| {
                (0..size)
                    .map(|j| {
                        if i == j {
                            0.0
                        } else {
                            beat_distance(&beats[i], &beats[j], &track.segments, weights)
                        }
                    })
                    .collect()
            })
            .collect();
        let values = rows.into_iter().flatten().collect();

        debug!("Computed {size}x{size} beat distance table");
        Self {
            size,
            values,
            weights: *weights,
        }
    }

    /// Build a table from explicit rows; used by tools that already hold a
    /// distance matrix. Returns `None` unless the rows form a square.
    #[must_use]
    pub fn from_rows(rows: &[Vec<f64>]) -> Option<Self> {
        let size = rows.len();
        if rows.iter().any(|r| r.len() != size) {
            return None;
        }
        Some(Self {
            size,
            values: rows.iter().flatten().copied().collect(),
            weights: DistanceWeights::default(),
        })
    }

    /// Number of beats covered by the table
    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[must_use]
    pub fn get(&self, a: usize, b: usize) -> f64 {
        self.values[a * self.size + b]
    }

    /// Weights the table was computed with
    #[must_use]
    pub fn weights(&self) -> &DistanceWeights {
        &self.weights
    }
}

//! # Graph Builder
//!
//! Builds the jump graph: for every beat, the set of other beats playback
//! may branch to without the listener noticing.
//!
//! ## Pipeline
//!
//! 1. **Candidates** - every other beat within `max_branch_threshold`,
//!    strongest (lowest distance) first, ties by smaller destination.
//! 2. **Threshold** - the explicit `current_threshold`, or a computed one:
//!    starting at 10 and stepping by 5, the first cutoff at which a sixth of
//!    the beats have at least one edge. Both are capped by
//!    `max_branch_threshold`.
//! 3. **Filters**, in order: `just_backwards`, `just_long_branches`,
//!    `remove_sequential_branches`, `max_branches`.
//! 4. **Last edge** - with `add_last_edge`, the latest beat that can loop
//!    back at all is guaranteed one live backward edge.
//!
//! 5. **Reach** - edges from before the last branch point that land past it
//!    are dropped, so every jump stays inside the loopable region.
//!
//! Every filter after the threshold keeps or drops an edge by looking only at
//! stronger edges, so lowering the threshold never grows the graph while the
//! last branch point stays put.
//!
//! ## Rebuilds
//!
//! [`GraphBuilder`] owns the distance table and is otherwise stateless: a
//! build is a pure function of distances, configuration and the deleted-edge
//! set. Deleted edges stay in the graph, flagged, so they can be shown and
//! restored.

use crate::analysis::TrackAnalysis;
use crate::config::JukeboxConfig;
use crate::distance::{BeatDistances, DistanceWeights};
use log::{debug, trace, warn};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

const THRESHOLD_START: f64 = 10.0;
const THRESHOLD_STEP: f64 = 5.0;
/// The computed threshold aims for at least `beats / TARGET_BRANCH_DIVISOR`
/// beats with an edge
const TARGET_BRANCH_DIVISOR: usize = 6;

/// Stable identifier of a jump, derived from its endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeId(u64);

impl EdgeId {
    #[must_use]
    pub fn new(src: usize, dest: usize) -> Self {
        Self(((src as u64) << 32) | (dest as u64 & 0xFFFF_FFFF))
    }

    #[must_use]
    pub fn src(self) -> usize {
        (self.0 >> 32) as usize
    }

    #[must_use]
    pub fn dest(self) -> usize {
        (self.0 & 0xFFFF_FFFF) as usize
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.src(), self.dest())
    }
}

impl FromStr for EdgeId {
    type Err = String;

    /// Parses the `src->dest` form produced by `Display`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (src, dest) = s
            .split_once("->")
            .ok_or_else(|| format!("expected SRC->DEST, got '{s}'"))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|e| format!("invalid beat index '{part}': {e}"))
        };
        Ok(Self::new(parse(src)?, parse(dest)?))
    }
}

/// Edges the user removed from consideration
pub type DeletedEdges = BTreeSet<EdgeId>;

/// A directed candidate jump between two beats
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub id: EdgeId,
    pub src: usize,
    pub dest: usize,
    /// Similarity score, lower is more interchangeable
    pub distance: f64,
    pub deleted: bool,
}

impl Edge {
    #[must_use]
    pub fn new(src: usize, dest: usize, distance: f64) -> Self {
        Self {
            id: EdgeId::new(src, dest),
            src,
            dest,
            distance,
            deleted: false,
        }
    }

    /// Number of beats the jump spans
    #[must_use]
    pub fn span(&self) -> usize {
        self.src.abs_diff(self.dest)
    }

    #[must_use]
    pub fn is_backward(&self) -> bool {
        self.dest < self.src
    }
}

/// Strongest first: lower distance, then smaller destination
fn strength_order(a_distance: f64, a_dest: usize, b_distance: f64, b_dest: usize) -> Ordering {
    a_distance.total_cmp(&b_distance).then(a_dest.cmp(&b_dest))
}

/// The jump graph of one track under one configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JumpGraph {
    total_beats: usize,
    computed_threshold: f64,
    current_threshold: f64,
    last_branch_point: Option<usize>,
    longest_reach: usize,
    /// Grouped by source beat, each group strongest first
    edges: Vec<Edge>,
    /// `edges[offsets[b]..offsets[b + 1]]` are the edges leaving beat `b`
    #[serde(skip)]
    offsets: Vec<usize>,
}

impl JumpGraph {
    fn assemble(total_beats: usize, computed_threshold: f64, current_threshold: f64, mut edges: Vec<Edge>) -> Self {
        edges.sort_by(|a, b| {
            a.src
                .cmp(&b.src)
                .then_with(|| strength_order(a.distance, a.dest, b.distance, b.dest))
        });

        let mut offsets = vec![0; total_beats + 1];
        for edge in &edges {
            offsets[edge.src + 1] += 1;
        }
        for b in 0..total_beats {
            offsets[b + 1] += offsets[b];
        }

        let last_branch_point = edges
            .iter()
            .filter(|e| !e.deleted && e.is_backward())
            .map(|e| e.src)
            .max();
        let longest_reach = edges.iter().filter(|e| !e.deleted).map(Edge::span).max().unwrap_or(0);

        Self {
            total_beats,
            computed_threshold,
            current_threshold,
            last_branch_point,
            longest_reach,
            edges,
            offsets,
        }
    }

    /// Assemble a graph from an explicit edge list.
    ///
    /// Edges leaving beats outside the track, and self-loops, are dropped.
    /// Both thresholds are set to the largest edge distance.
    #[must_use]
    pub fn from_edges(total_beats: usize, edges: impl IntoIterator<Item = Edge>) -> Self {
        let edges: Vec<Edge> = edges
            .into_iter()
            .filter(|e| {
                let keep = e.src < total_beats && e.src != e.dest;
                if !keep {
                    warn!("Dropping edge {} outside a {total_beats}-beat track", e.id);
                }
                keep
            })
            .collect();
        let threshold = edges.iter().map(|e| e.distance).fold(0.0, f64::max);
        Self::assemble(total_beats, threshold, threshold, edges)
    }

    #[must_use]
    pub fn total_beats(&self) -> usize {
        self.total_beats
    }

    /// Threshold derived from the track, whether or not it is in force
    #[must_use]
    pub fn computed_threshold(&self) -> f64 {
        self.computed_threshold
    }

    /// Threshold the graph was built with
    #[must_use]
    pub fn current_threshold(&self) -> f64 {
        self.current_threshold
    }

    /// Highest beat with a live edge to an earlier beat
    #[must_use]
    pub fn last_branch_point(&self) -> Option<usize> {
        self.last_branch_point
    }

    /// Largest span of any live edge
    #[must_use]
    pub fn longest_reach(&self) -> usize {
        self.longest_reach
    }

    /// Every retained edge, deleted ones included
    #[must_use]
    pub fn all_edges(&self) -> &[Edge] {
        &self.edges
    }

    #[must_use]
    pub fn live_edge_count(&self) -> usize {
        self.edges.iter().filter(|e| !e.deleted).count()
    }

    /// Edges leaving `beat`, strongest first, deleted ones included
    #[must_use]
    pub fn neighbors(&self, beat: usize) -> &[Edge] {
        if beat >= self.total_beats {
            return &[];
        }
        &self.edges[self.offsets[beat]..self.offsets[beat + 1]]
    }

    /// Edges leaving `beat` that are eligible for selection, strongest first
    pub fn live_neighbors(&self, beat: usize) -> impl Iterator<Item = &Edge> {
        self.neighbors(beat).iter().filter(|e| !e.deleted)
    }

    #[must_use]
    pub fn strongest_live_edge(&self, beat: usize) -> Option<&Edge> {
        self.live_neighbors(beat).next()
    }

    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.neighbors(id.src()).iter().find(|e| e.id == id)
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    dest: usize,
    distance: f64,
}

impl Candidate {
    fn stronger_than(&self, other: &Candidate) -> bool {
        strength_order(self.distance, self.dest, other.distance, other.dest) == Ordering::Less
    }
}

/// Builds jump graphs for one track
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    distances: BeatDistances,
}

impl GraphBuilder {
    /// Compute the distance table for `track`
    #[must_use]
    pub fn new(track: &TrackAnalysis, weights: &DistanceWeights) -> Self {
        Self::from_distances(BeatDistances::compute(track, weights))
    }

    #[must_use]
    pub fn from_distances(distances: BeatDistances) -> Self {
        Self { distances }
    }

    #[must_use]
    pub fn distances(&self) -> &BeatDistances {
        &self.distances
    }

    /// Build the graph for `config`, flagging the edges in `deleted`
    #[must_use]
    pub fn build(&self, config: &JukeboxConfig, deleted: &DeletedEdges) -> JumpGraph {
        let total = self.distances.len();
        let cap = config.max_branch_threshold();
        let candidates = self.candidates(cap);

        let computed = self.compute_threshold(&candidates, config);
        let threshold = config.current_threshold().map_or(computed, |t| t.min(cap));

        let mut retained: Vec<Vec<Candidate>> = candidates
            .iter()
            .enumerate()
            .map(|(src, cands)| prune(src, cands, threshold, config, total))
            .collect();

        if config.add_last_edge() {
            add_last_edge(&candidates, &mut retained, deleted);
        }

        let mut edges: Vec<Edge> = retained
            .into_iter()
            .enumerate()
            .flat_map(|(src, kept)| {
                kept.into_iter().map(move |c| Edge::new(src, c.dest, c.distance))
            })
            .map(|mut edge| {
                edge.deleted = deleted.contains(&edge.id);
                edge
            })
            .collect();

        // A jump from before the last branch point must not land past it,
        // or playback could reach the end of the track.
        let last_branch_point = edges
            .iter()
            .filter(|e| !e.deleted && e.is_backward())
            .map(|e| e.src)
            .max();
        if let Some(last) = last_branch_point {
            edges.retain(|e| {
                let keep = e.deleted || e.src >= last || e.dest <= last;
                if !keep {
                    trace!("Dropping {} past the last branch point {last}", e.id);
                }
                keep
            });
        }

        let graph = JumpGraph::assemble(total, computed, threshold, edges);
        debug!(
            "Built jump graph: {} beats, threshold {} (computed {}), {} edges ({} live), last branch point {:?}",
            total,
            threshold,
            computed,
            graph.all_edges().len(),
            graph.live_edge_count(),
            graph.last_branch_point()
        );
        graph
    }

    /// All other beats within `cap`, strongest first
    fn candidates(&self, cap: f64) -> Vec<Vec<Candidate>> {
        let total = self.distances.len();
        (0..total)
            .map(|src| {
                let mut cands: Vec<Candidate> = (0..total)
                    .filter(|&dest| dest != src)
                    .map(|dest| Candidate {
                        dest,
                        distance: self.distances.get(src, dest),
                    })
                    .filter(|c| c.distance <= cap)
                    .collect();
                cands.sort_by(|a, b| strength_order(a.distance, a.dest, b.distance, b.dest));
                cands
            })
            .collect()
    }

    /// The first cutoff on the `10, 15, 20, ...` grid that meets the branch
    /// target, or `cap` when none does.
    ///
    /// Only cutoffs at or above some candidate distance can change the
    /// result, so the search skips the empty stretches of the grid and stops
    /// once every candidate is in.
    fn compute_threshold(&self, candidates: &[Vec<Candidate>], config: &JukeboxConfig) -> f64 {
        let total = candidates.len();
        let cap = config.max_branch_threshold();
        let target = total / TARGET_BRANCH_DIVISOR;

        let mut distances: Vec<f64> = candidates.iter().flatten().map(|c| c.distance).collect();
        distances.sort_by(f64::total_cmp);
        distances.dedup();

        let mut threshold = THRESHOLD_START;
        while threshold < cap {
            let branching = candidates
                .iter()
                .enumerate()
                .filter(|(src, cands)| !prune(*src, cands, threshold, config, total).is_empty())
                .count();
            trace!("Threshold {threshold}: {branching} of {total} beats branch (target {target})");
            if branching >= target {
                return threshold;
            }

            let Some(&next) = distances.get(distances.partition_point(|&d| d <= threshold)) else {
                trace!("Every candidate is within {threshold}, target unreachable");
                break;
            };
            let stepped = threshold + ((next - threshold) / THRESHOLD_STEP).ceil().max(1.0) * THRESHOLD_STEP;
            threshold = if stepped > threshold { stepped } else { next };
        }
        cap
    }
}

/// Apply the threshold and the filters to one source beat's candidates
fn prune(src: usize, cands: &[Candidate], threshold: f64, config: &JukeboxConfig, total: usize) -> Vec<Candidate> {
    let min_long = config.min_long_branch(total);
    let mut kept: Vec<Candidate> = cands
        .iter()
        .filter(|c| c.distance <= threshold)
        .filter(|c| !config.just_backwards() || c.dest < src)
        .filter(|c| !config.just_long_branches() || c.dest.abs_diff(src) >= min_long)
        .copied()
        .collect();

    if config.remove_sequential_branches() {
        let snapshot = kept.clone();
        kept.retain(|c| {
            !snapshot
                .iter()
                .any(|other| other.dest.abs_diff(c.dest) == 1 && other.stronger_than(c))
        });
    }

    kept.truncate(config.max_branches());
    kept
}

/// Give the latest beat that can loop back at all one live backward edge
fn add_last_edge(candidates: &[Vec<Candidate>], retained: &mut [Vec<Candidate>], deleted: &DeletedEdges) {
    let usable = |src: usize, c: &Candidate| c.dest < src && !deleted.contains(&EdgeId::new(src, c.dest));

    for src in (0..candidates.len()).rev() {
        let Some(best) = candidates[src].iter().find(|c| usable(src, c)) else {
            continue;
        };
        if retained[src].iter().any(|c| usable(src, c)) {
            trace!("Beat {src} already loops back");
            return;
        }
        debug!("Adding loop-back edge {src}->{} ({:.3})", best.dest, best.distance);
        retained[src].push(*best);
        retained[src].sort_by(|a, b| strength_order(a.distance, a.dest, b.distance, b.dest));
        return;
    }
}

/// Convenience: compute distances and build with no deleted edges
#[must_use]
pub fn build_jump_graph(track: &TrackAnalysis, config: &JukeboxConfig) -> JumpGraph {
    GraphBuilder::new(track, config.weights()).build(config, &DeletedEdges::new())
}

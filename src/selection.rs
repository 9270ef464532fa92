//! # Selection Engine
//!
//! Decides where the walk goes after a beat. The decision is a pure function
//! of the current beat, the graph snapshot, the configuration, one random
//! draw and the adaptive [`BranchChance`].
//!
//! ## Rule order
//!
//! 1. At the graph's last branch point a jump is forced: the strongest live
//!    edge wins, or the walk advances sequentially if there is none.
//! 2. Otherwise one value is drawn; below the current branch chance the
//!    strongest live edge is taken, if any.
//! 3. Otherwise the walk advances to the next beat, or ends after the last.
//!
//! ## Branch chance
//!
//! Every beat played without a jump raises the chance by
//! `random_branch_chance_delta` up to the maximum; a jump drops it back to
//! the minimum. Long stretches without a jump therefore grow ever more
//! likely to end in one.

use crate::config::JukeboxConfig;
use crate::graph::{Edge, EdgeId, JumpGraph};
use crate::random::UniformSource;
use log::trace;
use serde::Serialize;

/// Outcome of one selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    /// Beat to play next
    pub index: usize,
    pub jumped: bool,
    /// Edge taken, for jumps
    pub edge: Option<EdgeId>,
}

impl Selection {
    fn sequential(index: usize) -> Self {
        Self {
            index,
            jumped: false,
            edge: None,
        }
    }

    fn jump(edge: &Edge) -> Self {
        Self {
            index: edge.dest,
            jumped: true,
            edge: Some(edge.id),
        }
    }
}

/// Probability that the next unforced decision jumps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchChance {
    current: f64,
}

impl BranchChance {
    /// Start at the configured minimum
    #[must_use]
    pub fn new(config: &JukeboxConfig) -> Self {
        Self {
            current: config.min_random_branch_chance(),
        }
    }

    #[must_use]
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Update after a played beat
    pub fn record(&mut self, jumped: bool, config: &JukeboxConfig) {
        self.current = if jumped {
            config.min_random_branch_chance()
        } else {
            (self.current + config.random_branch_chance_delta()).min(config.max_random_branch_chance())
        };
    }
}

fn advance(seed: usize, graph: &JumpGraph) -> Option<Selection> {
    let next = seed + 1;
    (next < graph.total_beats()).then(|| Selection::sequential(next))
}

/// Choose the beat after `seed`. `None` means the track has ended.
pub fn select_next(
    seed: usize,
    graph: &JumpGraph,
    config: &JukeboxConfig,
    rng: &mut impl UniformSource,
    chance: &BranchChance,
) -> Option<Selection> {
    if graph.last_branch_point() == Some(seed) {
        trace!("Beat {seed} is the last branch point, forcing a jump");
        return select_forced(seed, graph);
    }

    // A ramp carried over from an older configuration is read within the current bounds.
    let p = chance
        .current()
        .clamp(config.min_random_branch_chance(), config.max_random_branch_chance());
    let r = rng.next_f64();
    if r < p {
        if let Some(edge) = graph.strongest_live_edge(seed) {
            trace!("Beat {seed}: drew {r:.3} < {p:.3}, jumping via {}", edge.id);
            return Some(Selection::jump(edge));
        }
    }

    advance(seed, graph)
}

/// Choose the beat after `seed` as if a jump were forced: the strongest live
/// edge, or the next beat when `seed` has none. Never draws.
#[must_use]
pub fn select_forced(seed: usize, graph: &JumpGraph) -> Option<Selection> {
    graph
        .strongest_live_edge(seed)
        .map(Selection::jump)
        .or_else(|| advance(seed, graph))
}

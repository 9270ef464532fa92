//! # Playback Engine
//!
//! Drives the walk in step with an external audio clock.
//!
//! ## Ticks
//!
//! The audio side calls [`JukeboxPlayer::tick`] each time playback crosses a
//! beat boundary. The transition out of a beat is chosen as soon as that beat
//! begins, so a tick only has to apply it: jumps seek the transport to the
//! destination beat, sequential advances let the audio play through.
//!
//! ## State
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --resume--> Running
//!                    |                  |
//!                    +---stop / end-----+------> Idle
//! ```
//!
//! Ticks outside `Running` are ignored, so pausing and resuming never
//! replays skipped beats.
//!
//! ## Graph snapshots
//!
//! The player reads one immutable [`JumpGraph`] behind an `Arc`. Deleting or
//! restoring an edge, or changing the configuration, builds a new snapshot
//! and swaps it in before the next tick; renderers holding the old one keep
//! a consistent view.

use crate::analysis::TrackAnalysis;
use crate::config::JukeboxConfig;
use crate::graph::{DeletedEdges, EdgeId, GraphBuilder, JumpGraph};
use crate::random::UniformSource;
use crate::selection::{select_forced, select_next, BranchChance, Selection};
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::sync::Arc;

/// Commands the engine sends to the audio player
pub trait AudioTransport {
    fn play(&mut self);
    fn pause(&mut self);
    /// Move playback to `seconds` from the start of the track
    fn seek(&mut self, seconds: f64);
    fn stop(&mut self);
}

/// Transport that only logs, for simulated walks
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl AudioTransport for NullTransport {
    fn play(&mut self) {
        trace!("transport: play");
    }

    fn pause(&mut self) {
        trace!("transport: pause");
    }

    fn seek(&mut self, seconds: f64) {
        trace!("transport: seek to {seconds:.3}s");
    }

    fn stop(&mut self) {
        trace!("transport: stop");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayerState {
    Idle,
    Running,
    Paused,
}

/// Observable progress after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub current_beat_index: Option<usize>,
    pub last_jumped: bool,
    pub last_jump_from_index: Option<usize>,
    pub beats_played: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    /// Playback began at the first beat
    Started(TickReport),
    /// The walk moved to a new beat
    Advanced(TickReport),
    /// The track ended and the player is idle again
    EndOfTrack(TickReport),
    /// The request did not apply in the current state
    Ignored,
}

/// The jukebox: one track, its jump graph, and the walk through it
pub struct JukeboxPlayer<T: AudioTransport, R: UniformSource> {
    track: Arc<TrackAnalysis>,
    builder: GraphBuilder,
    config: JukeboxConfig,
    graph: Arc<JumpGraph>,
    deleted: DeletedEdges,
    transport: T,
    rng: R,
    chance: BranchChance,
    state: PlayerState,
    forced: bool,
    current: Option<usize>,
    pending: Option<Selection>,
    last_jumped: bool,
    last_jump_from: Option<usize>,
    beats_played: u64,
}

impl<T: AudioTransport, R: UniformSource> JukeboxPlayer<T, R> {
    /// Compute distances and build the initial graph for `track`
    pub fn new(track: Arc<TrackAnalysis>, config: JukeboxConfig, transport: T, rng: R) -> Self {
        let builder = GraphBuilder::new(&track, config.weights());
        let deleted = DeletedEdges::new();
        let graph = Arc::new(builder.build(&config, &deleted));
        let chance = BranchChance::new(&config);

        Self {
            track,
            builder,
            config,
            graph,
            deleted,
            transport,
            rng,
            chance,
            state: PlayerState::Idle,
            forced: false,
            current: None,
            pending: None,
            last_jumped: false,
            last_jump_from: None,
            beats_played: 0,
        }
    }

    /// Begin playback at the first beat
    pub fn start(&mut self) -> TickEvent {
        if self.state != PlayerState::Idle {
            warn!("start requested while {:?}", self.state);
            return TickEvent::Ignored;
        }

        self.current = None;
        self.pending = None;
        self.last_jumped = false;
        self.last_jump_from = None;
        self.beats_played = 0;
        self.chance = BranchChance::new(&self.config);

        let Some(first) = self.track.beats.first() else {
            info!("Track has no beats, nothing to play");
            return TickEvent::EndOfTrack(self.report());
        };

        info!("Starting playback of {} beats", self.track.beats.len());
        self.state = PlayerState::Running;
        self.current = Some(0);
        self.transport.play();
        self.transport.seek(first.start);
        self.commit();
        TickEvent::Started(self.report())
    }

    /// Apply the committed transition; called once per beat boundary
    pub fn tick(&mut self) -> TickEvent {
        if self.state != PlayerState::Running {
            trace!("Tick ignored while {:?}", self.state);
            return TickEvent::Ignored;
        }
        let Some(from) = self.current else {
            return TickEvent::Ignored;
        };

        let Some(selection) = self.pending.take() else {
            return self.finish();
        };
        let Some(beat) = self.track.beats.get(selection.index) else {
            warn!("Selected beat {} lies outside the track", selection.index);
            return self.finish();
        };

        if selection.jumped {
            self.transport.seek(beat.start);
            self.last_jump_from = Some(from);
            debug!("Jumped {from} -> {}", selection.index);
        }
        self.last_jumped = selection.jumped;
        self.chance.record(selection.jumped, &self.config);
        self.current = Some(selection.index);
        self.beats_played += 1;
        self.commit();
        TickEvent::Advanced(self.report())
    }

    pub fn pause(&mut self) -> bool {
        if self.state != PlayerState::Running {
            return false;
        }
        info!("Pausing at beat {:?}", self.current);
        self.state = PlayerState::Paused;
        self.transport.pause();
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != PlayerState::Paused {
            return false;
        }
        info!("Resuming at beat {:?}", self.current);
        self.state = PlayerState::Running;
        self.transport.play();
        true
    }

    pub fn stop(&mut self) {
        if self.state == PlayerState::Idle {
            return;
        }
        info!("Stopping after {} beats", self.beats_played);
        self.state = PlayerState::Idle;
        self.pending = None;
        self.transport.stop();
    }

    /// Replace the track. Playback stops and the graph is rebuilt.
    pub fn load_track(&mut self, track: Arc<TrackAnalysis>) {
        self.stop();
        self.builder = GraphBuilder::new(&track, self.config.weights());
        self.track = track;
        self.deleted.clear();
        self.current = None;
        self.rebuild();
    }

    /// While enabled every beat jumps along its strongest live edge
    pub fn set_forced_branching(&mut self, forced: bool) {
        if self.forced == forced {
            return;
        }
        debug!("Forced branching {}", if forced { "on" } else { "off" });
        self.forced = forced;
        self.recommit();
    }

    /// Mark an edge deleted and rebuild. Returns `false` for ids not in the
    /// graph, which leave everything untouched.
    pub fn delete_edge(&mut self, id: EdgeId) -> bool {
        if self.graph.edge(id).is_none() {
            warn!("Ignoring deletion of unknown edge {id}");
            return false;
        }
        if self.deleted.insert(id) {
            info!("Deleted edge {id}");
            self.rebuild();
            self.recommit();
        }
        true
    }

    /// Undo a deletion. Returns `false` if `id` was not deleted.
    pub fn restore_edge(&mut self, id: EdgeId) -> bool {
        if !self.deleted.remove(&id) {
            warn!("Ignoring restore of edge {id}, which is not deleted");
            return false;
        }
        info!("Restored edge {id}");
        self.rebuild();
        self.recommit();
        true
    }

    /// Swap in a new configuration. The branch chance restarts at the new
    /// minimum and the committed transition is chosen again.
    pub fn set_config(&mut self, config: JukeboxConfig) {
        if config.weights() != self.builder.distances().weights() {
            debug!("Distance weights changed, recomputing distances");
            self.builder = GraphBuilder::new(&self.track, config.weights());
        }
        self.config = config;
        self.chance = BranchChance::new(&self.config);
        self.rebuild();
        self.recommit();
    }

    /// Current graph snapshot
    #[must_use]
    pub fn graph(&self) -> Arc<JumpGraph> {
        Arc::clone(&self.graph)
    }

    #[must_use]
    pub fn track(&self) -> &TrackAnalysis {
        &self.track
    }

    #[must_use]
    pub fn config(&self) -> &JukeboxConfig {
        &self.config
    }

    #[must_use]
    pub fn deleted_edges(&self) -> &DeletedEdges {
        &self.deleted
    }

    #[must_use]
    pub fn state(&self) -> PlayerState {
        self.state
    }

    #[must_use]
    pub fn forced_branching(&self) -> bool {
        self.forced
    }

    #[must_use]
    pub fn branch_chance(&self) -> f64 {
        self.chance.current()
    }

    /// Transition that the next tick will apply
    #[must_use]
    pub fn pending(&self) -> Option<Selection> {
        self.pending
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn report(&self) -> TickReport {
        TickReport {
            current_beat_index: self.current,
            last_jumped: self.last_jumped,
            last_jump_from_index: self.last_jump_from,
            beats_played: self.beats_played,
        }
    }

    fn commit(&mut self) {
        self.pending = self.current.and_then(|beat| {
            if self.forced {
                select_forced(beat, &self.graph)
            } else {
                select_next(beat, &self.graph, &self.config, &mut self.rng, &self.chance)
            }
        });
        trace!("Beat {:?}: committed {:?}", self.current, self.pending);
    }

    fn recommit(&mut self) {
        if self.state != PlayerState::Idle {
            self.commit();
        }
    }

    fn rebuild(&mut self) {
        self.graph = Arc::new(self.builder.build(&self.config, &self.deleted));
    }

    fn finish(&mut self) -> TickEvent {
        info!("End of track after {} beats", self.beats_played);
        self.state = PlayerState::Idle;
        self.pending = None;
        self.transport.stop();
        TickEvent::EndOfTrack(self.report())
    }
}

//! Endless playback of a song by jumping between beats that sound alike.
//!
//! Core modules:
//! - [`analysis`] - Quantum Linker: validates raw analysis and links beats,
//!   bars, sections, tatums and segments
//! - [`distance`] - Beat similarity and the pairwise distance table
//! - [`graph`] - Graph Builder: the jump graph and its pruning rules
//! - [`selection`] - Selection Engine: where the walk goes next
//! - [`playback`] - Playback Engine: the tick-driven state machine
//!
//! ### Supporting Modules
//!
//! - [`config`] - Configuration, validation and config file handling
//! - [`random`] - Random sources (random, seeded, deterministic)
//! - [`stats`] - Branch statistics and graph comparison
//! - [`error`] - Error types
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use jukebox::analysis::{load_analysis_file, normalize};
//! use jukebox::config::JukeboxConfig;
//! use jukebox::playback::{JukeboxPlayer, NullTransport, TickEvent};
//! use jukebox::random::RandomSource;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let raw = load_analysis_file(Path::new("song.json"))?;
//! let track = Arc::new(normalize(&raw)?);
//! let mut player = JukeboxPlayer::new(
//!     track,
//!     JukeboxConfig::default(),
//!     NullTransport,
//!     RandomSource::seeded(7),
//! );
//!
//! player.start();
//! while let TickEvent::Advanced(report) = player.tick() {
//!     if report.last_jumped {
//!         println!("jumped to beat {:?}", report.current_beat_index);
//!     }
//!     if report.beats_played >= 512 {
//!         break;
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## How a Walk Works
//!
//! 1. The analysis is normalized into flat per-level arrays whose cross
//!    references (`prev`, `next`, `parent`, `children`, overlapping
//!    segments) are plain indices.
//! 2. Every pair of beats gets a distance from the segments overlapping
//!    them. Pairs under the threshold become edges, pruned by the
//!    configuration.
//! 3. At each beat the selection engine either advances or jumps along the
//!    strongest edge. The chance of a jump grows with every beat played
//!    straight through and resets after a jump.
//! 4. Near the end of the track the last branch point forces a jump back, so
//!    the song never has to end.
//!
//! ## Error Handling
//!
//! Library functions return [`Result`], whose error is [`JukeboxError`]:
//!
//! - Malformed analysis, naming the offending field
//! - Invalid configuration, rejected when the configuration is built
//! - File system and JSON errors from the file helpers
//!
//! Steady-state playback never fails: missing or deleted edges fall back to
//! sequential advance, and unknown edge ids are ignored.
//!
//! ## Testing
//!
//! Unit tests live next to each module, integration tests under `tests/`,
//! and criterion benchmarks under `benches/`:
//! ```bash
//! cargo test
//! cargo bench
//! ```

pub mod analysis;
pub mod cli;
pub mod completion;
pub mod config;
pub mod distance;
pub mod error;
pub mod graph;
pub mod playback;
pub mod random;
pub mod selection;
pub mod stats;

pub use error::{JukeboxError, Result};

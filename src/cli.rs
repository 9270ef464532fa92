//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `jukebox` binary. The binary is a harness
//! around the in-memory engine: it reads analysis JSON, builds graphs, and
//! simulates walks without touching any audio.
//!
//! ## Commands
//!
//! - `graph`: Build the jump graph for an analysis and print its statistics
//! - `walk`: Simulate playback for a number of beats
//! - `compare`: Score how closely two analyses of one song agree
//! - `config`: Print the effective configuration
//! - `completion`: Generate shell completions
//!
//! ## Examples
//!
//! ```bash
//! jukebox graph song.json --json > edges.json
//! jukebox walk song.json --beats 256 --mode seeded --seed 7
//! jukebox compare gold.json generated.json
//! ```

use crate::config::ConfigBuilder;
use crate::graph::EdgeId;
use crate::random::RandomMode;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser)]
#[command(name = "jukebox")]
#[command(about = "Jukebox: endless walks through a song's beat graph")]
#[command(version)]
pub struct Args {
    /// Configuration file (JSON); defaults to the user config file if present
    #[arg(long, global = true, env = "JUKEBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Build the jump graph and print its statistics
    ///
    /// Reports the threshold in force, the number of edges, the last branch
    /// point and the longest jump.
    Graph {
        /// Analysis JSON file
        analysis: PathBuf,

        #[command(flatten)]
        overrides: GraphOverrides,

        /// Print the full graph as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Simulate playback and print every jump
    ///
    /// Ticks the engine once per beat without audio. Stops after `--beats`
    /// ticks or at the end of the track.
    Walk {
        /// Analysis JSON file
        analysis: PathBuf,

        #[command(flatten)]
        overrides: GraphOverrides,

        /// Number of beats to play
        #[arg(short, long, default_value = "128")]
        beats: u64,

        /// Random source used for branch decisions
        #[arg(long, value_enum, default_value_t = RandomMode::Random)]
        mode: RandomMode,

        /// Seed for `--mode seeded`
        #[arg(long)]
        seed: Option<u64>,

        /// Delete an edge before playing, as SRC->DEST (repeatable)
        #[arg(long = "delete-edge", value_name = "SRC->DEST")]
        delete_edges: Vec<EdgeId>,

        /// Jump along the strongest edge at every beat
        #[arg(long)]
        force_branching: bool,

        /// Print every beat, not only jumps
        #[arg(short, long)]
        verbose: bool,
    },

    /// Compare the graphs of two analyses of the same song
    ///
    /// Scores threshold, branching fraction, neighbour histogram and median
    /// edge distance, and blends them into a percentage.
    Compare {
        /// Reference analysis
        gold: PathBuf,

        /// Analysis to score against the reference
        generated: PathBuf,

        #[command(flatten)]
        overrides: GraphOverrides,

        /// Print the comparison as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as JSON
    Config {
        #[command(flatten)]
        overrides: GraphOverrides,
    },

    /// Generate shell completions
    ///
    /// Usage: jukebox completion bash > ~/.local/share/bash-completion/completions/jukebox
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Command-line overrides applied on top of the configuration file
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct GraphOverrides {
    /// Maximum edges kept per beat
    #[arg(long)]
    pub max_branches: Option<usize>,

    /// Upper bound on any similarity threshold
    #[arg(long)]
    pub max_branch_threshold: Option<f64>,

    /// Explicit similarity threshold instead of the computed one
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Only keep jumps to earlier beats
    #[arg(long)]
    pub just_backwards: bool,

    /// Only keep jumps spanning at least this many beats
    #[arg(long, value_name = "BEATS")]
    pub min_long_branch: Option<usize>,

    /// Drop jumps whose neighbouring destination is a stronger jump
    #[arg(long)]
    pub remove_sequential: bool,

    /// Do not add a loop-back edge near the end of the track
    #[arg(long)]
    pub no_last_edge: bool,
}

impl GraphOverrides {
    /// Apply the overrides that were given to `draft`
    pub fn apply(&self, draft: &mut ConfigBuilder) {
        if let Some(n) = self.max_branches {
            draft.max_branches = n;
        }
        if let Some(t) = self.max_branch_threshold {
            draft.max_branch_threshold = t;
        }
        if let Some(t) = self.threshold {
            draft.current_threshold = Some(t);
        }
        if self.just_backwards {
            draft.just_backwards = true;
        }
        if let Some(n) = self.min_long_branch {
            draft.just_long_branches = true;
            draft.min_long_branch = Some(n);
        }
        if self.remove_sequential {
            draft.remove_sequential_branches = true;
        }
        if self.no_last_edge {
            draft.add_last_edge = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_walk() {
        let args = Args::try_parse_from([
            "jukebox",
            "walk",
            "song.json",
            "--mode",
            "seeded",
            "--seed",
            "7",
            "--delete-edge",
            "12->3",
            "--threshold",
            "40",
        ])
        .unwrap();

        match args.command {
            Command::Walk {
                mode,
                seed,
                delete_edges,
                overrides,
                beats,
                ..
            } => {
                assert_eq!(mode, RandomMode::Seeded);
                assert_eq!(seed, Some(7));
                assert_eq!(delete_edges, vec![EdgeId::new(12, 3)]);
                assert_eq!(overrides.threshold, Some(40.0));
                assert_eq!(beats, 128);
            }
            _ => panic!("expected walk"),
        }
    }

    #[test]
    fn test_overrides_apply() {
        let overrides = GraphOverrides {
            max_branches: Some(2),
            min_long_branch: Some(16),
            no_last_edge: true,
            ..GraphOverrides::default()
        };
        let mut draft = ConfigBuilder::default();
        overrides.apply(&mut draft);

        assert_eq!(draft.max_branches, 2);
        assert!(draft.just_long_branches);
        assert_eq!(draft.min_long_branch, Some(16));
        assert!(!draft.add_last_edge);
        assert!(!draft.just_backwards);
    }
}

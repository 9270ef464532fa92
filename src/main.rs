//! # Jukebox
//!
//! Command-line harness around the jukebox engine: builds jump graphs from
//! analysis files, simulates walks and compares analyses.
//!
//! ## Usage
//!
//! ```bash
//! # Summarize the jump graph
//! jukebox graph song.json
//!
//! # Reproducible walk of 512 beats
//! jukebox walk song.json --beats 512 --mode seeded --seed 42
//!
//! # Score a generated analysis against a reference
//! jukebox compare gold.json generated.json
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use jukebox::analysis::{load_analysis_file, normalize, TrackAnalysis};
use jukebox::cli::{self, GraphOverrides};
use jukebox::completion;
use jukebox::config::{self, JukeboxConfig};
use jukebox::graph::build_jump_graph;
use jukebox::playback::{JukeboxPlayer, NullTransport, TickEvent};
use jukebox::random::RandomSource;
use jukebox::stats::{compare, BranchStats};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Load and normalize one analysis file
fn load_track(path: &Path) -> Result<TrackAnalysis> {
    let raw = load_analysis_file(path).with_context(|| format!("Failed to read analysis {}", path.display()))?;
    let track = normalize(&raw).with_context(|| format!("Invalid analysis in {}", path.display()))?;
    info!(
        "Loaded {}: {} beats, {} segments",
        path.display(),
        track.beats.len(),
        track.segments.len()
    );
    Ok(track)
}

/// Configuration file (or defaults) with command-line overrides applied
fn effective_config(path: Option<&PathBuf>, overrides: &GraphOverrides) -> Result<JukeboxConfig> {
    let base = config::load_or_default(path.map(PathBuf::as_path)).context("Failed to load configuration")?;
    let mut draft = base.to_builder();
    overrides.apply(&mut draft);
    debug!("Effective configuration: {draft:?}");
    draft.build().context("Invalid configuration")
}

/// Main entry point for the jukebox binary.
///
/// Logging is controlled via `RUST_LOG`:
/// - `RUST_LOG=debug jukebox graph song.json` - Graph-building decisions
/// - `RUST_LOG=jukebox::selection=trace jukebox walk song.json` - Every decision
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let config_path = args.config.as_ref();

    match args.command {
        cli::Command::Graph {
            analysis,
            overrides,
            json,
        } => {
            let config = effective_config(config_path, &overrides)?;
            let track = load_track(&analysis)?;
            let graph = build_jump_graph(&track, &config);

            if json {
                println!("{}", serde_json::to_string_pretty(&graph)?);
            } else {
                let stats = BranchStats::from_graph(&graph, config.max_branches());
                println!("beats:              {}", graph.total_beats());
                println!("threshold:          {} (computed {})", graph.current_threshold(), graph.computed_threshold());
                println!("edges:              {}", graph.live_edge_count());
                println!("branching beats:    {:.1}%", stats.branching_fraction * 100.0);
                println!("median distance:    {:.3}", stats.median_distance);
                match graph.last_branch_point() {
                    Some(beat) => println!("last branch point:  {beat}"),
                    None => println!("last branch point:  none"),
                }
                println!("longest reach:      {} beats", graph.longest_reach());
            }
        }
        cli::Command::Walk {
            analysis,
            overrides,
            beats,
            mode,
            seed,
            delete_edges,
            force_branching,
            verbose,
        } => {
            let config = effective_config(config_path, &overrides)?;
            let track = Arc::new(load_track(&analysis)?);
            let rng = RandomSource::from_mode(mode, seed);
            let mut player = JukeboxPlayer::new(track, config, NullTransport, rng);

            for id in delete_edges {
                if !player.delete_edge(id) {
                    warn!("Edge {id} is not in the graph");
                }
            }
            player.set_forced_branching(force_branching);

            let mut event = player.start();
            while let TickEvent::Started(report) | TickEvent::Advanced(report) = event {
                if report.beats_played >= beats {
                    break;
                }
                event = player.tick();
                if let TickEvent::Advanced(next) = event {
                    if next.last_jumped {
                        println!(
                            "{:>6}  jump {} -> {}",
                            next.beats_played,
                            next.last_jump_from_index.unwrap_or_default(),
                            next.current_beat_index.unwrap_or_default()
                        );
                    } else if verbose {
                        println!("{:>6}  beat {}", next.beats_played, next.current_beat_index.unwrap_or_default());
                    }
                }
            }

            let report = player.report();
            if matches!(event, TickEvent::EndOfTrack(_)) {
                println!("End of track after {} beats", report.beats_played);
            } else {
                println!(
                    "Played {} beats, now at beat {}",
                    report.beats_played,
                    report.current_beat_index.unwrap_or_default()
                );
            }
            player.stop();
        }
        cli::Command::Compare {
            gold,
            generated,
            overrides,
            json,
        } => {
            let config = effective_config(config_path, &overrides)?;
            let stats_for = |path: &Path| -> Result<BranchStats> {
                let graph = build_jump_graph(&load_track(path)?, &config);
                Ok(BranchStats::from_graph(&graph, config.max_branches()))
            };
            let result = compare(stats_for(&gold)?, stats_for(&generated)?);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("similarity={:.2}%", result.similarity);
                println!("threshold score={:.3}", result.scores.threshold);
                println!("branching score={:.3}", result.scores.branching);
                println!("histogram score={:.3}", result.scores.histogram);
                println!("edges score={:.3}", result.scores.edges);
                println!("gold threshold={}", result.gold.computed_threshold);
                println!("gen threshold={}", result.generated.computed_threshold);
                println!("gold branching={:.3}", result.gold.branching_fraction);
                println!("gen branching={:.3}", result.generated.branching_fraction);
                println!("gold hist={:?}", result.gold.neighbor_hist);
                println!("gen hist={:?}", result.generated.neighbor_hist);
                println!("gold median distance={:.3}", result.gold.median_distance);
                println!("gen median distance={:.3}", result.generated.median_distance);
            }
        }
        cli::Command::Config { overrides } => {
            let config = effective_config(config_path, &overrides)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
    }

    Ok(())
}

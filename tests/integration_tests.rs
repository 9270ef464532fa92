//! # Integration Tests for Jukebox
//!
//! End-to-end tests from analysis files on disk through graph building and
//! simulated playback, plus the command-line binary.

use anyhow::Result;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const BEAT: f64 = 0.5;

/// Analysis JSON for `beats` half-second beats in 4/4 whose audio repeats
/// every `period` beats
fn synthetic_analysis(beats: usize, period: usize) -> Value {
    let quanta = |count: usize, len: f64| -> Vec<Value> {
        (0..count)
            .map(|i| json!({"start": i as f64 * len, "duration": len, "confidence": 1.0}))
            .collect()
    };
    let segments: Vec<Value> = (0..beats)
        .map(|i| {
            let pattern = i % period;
            let base = pattern as f64;
            json!({
                "start": i as f64 * BEAT,
                "duration": BEAT,
                "confidence": 0.5,
                "loudness_start": -20.0 + base,
                "loudness_max": -10.0 + base,
                "loudness_max_time": 0.05,
                "pitches": (0..12).map(|k| ((k + pattern) % 12) as f64 / 12.0).collect::<Vec<_>>(),
                "timbre": (0..12).map(|k| base * 3.0 + k as f64).collect::<Vec<_>>(),
            })
        })
        .collect();

    json!({
        "sections": quanta(1, beats as f64 * BEAT),
        "bars": quanta(beats.div_ceil(4), BEAT * 4.0),
        "beats": quanta(beats, BEAT),
        "tatums": quanta(beats * 2, BEAT / 2.0),
        "segments": segments,
        "track": {"duration": beats as f64 * BEAT, "tempo": 120.0, "time_signature": 4},
    })
}

/// Write `value` as JSON into a fresh temp directory
fn write_json(name: &str, value: &Value) -> Result<(TempDir, PathBuf)> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value)?)?;
    Ok((temp_dir, path))
}

fn jukebox(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_jukebox"))
        .args(args)
        .env_remove("JUKEBOX_CONFIG")
        .output()
        .expect("Failed to run jukebox")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

#[cfg(test)]
mod library_tests {
    use super::*;
    use jukebox::analysis::{load_analysis_file, normalize};
    use jukebox::config::{load_config, load_or_default, save_config, ConfigBuilder, JukeboxConfig};
    use jukebox::graph::{build_jump_graph, EdgeId};
    use jukebox::playback::{JukeboxPlayer, NullTransport, TickEvent};
    use jukebox::random::RandomSource;
    use jukebox::JukeboxError;
    use std::sync::Arc;

    fn walk(path: &Path, seed: u64, ticks: u64) -> Result<Vec<usize>> {
        let track = Arc::new(normalize(&load_analysis_file(path)?)?);
        let mut player = JukeboxPlayer::new(track, JukeboxConfig::default(), NullTransport, RandomSource::seeded(seed));
        let mut beats = Vec::new();
        player.start();
        for _ in 0..ticks {
            match player.tick() {
                TickEvent::Advanced(report) => beats.extend(report.current_beat_index),
                _ => break,
            }
        }
        Ok(beats)
    }

    #[test]
    fn test_file_to_graph() -> Result<()> {
        let (_dir, path) = write_json("song.json", &synthetic_analysis(64, 16))?;
        let track = normalize(&load_analysis_file(&path)?)?;
        let graph = build_jump_graph(&track, &JukeboxConfig::default());

        assert_eq!(graph.total_beats(), 64);
        assert!(graph.live_edge_count() > 0);
        assert_eq!(graph.last_branch_point(), Some(63));
        assert!(graph.edge(EdgeId::new(17, 1)).is_some());
        Ok(())
    }

    #[test]
    fn test_wrapped_analysis_document() -> Result<()> {
        let (_dir, path) = write_json("wrapped.json", &json!({"analysis": synthetic_analysis(8, 4)}))?;
        let track = normalize(&load_analysis_file(&path)?)?;
        assert_eq!(track.beats.len(), 8);
        Ok(())
    }

    #[test]
    fn test_malformed_analysis_names_field() -> Result<()> {
        let mut doc = synthetic_analysis(8, 4);
        doc["beats"][3]["duration"] = json!(-1.0);
        let (_dir, path) = write_json("bad.json", &doc)?;

        match normalize(&load_analysis_file(&path)?) {
            Err(JukeboxError::MalformedAnalysis { path, .. }) => assert_eq!(path, "beats[3].duration"),
            other => panic!("expected malformed analysis, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_seeded_walks_repeat() -> Result<()> {
        let (_dir, path) = write_json("song.json", &synthetic_analysis(64, 16))?;
        let first = walk(&path, 11, 400)?;
        let second = walk(&path, 11, 400)?;

        assert_eq!(first.len(), 400);
        assert_eq!(first, second);
        // The walk outlives the track by looping back.
        assert!(first.windows(2).any(|w| w[1] != w[0] + 1));
        Ok(())
    }

    #[test]
    fn test_config_file_round_trip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.json");
        let config = ConfigBuilder {
            max_branches: 2,
            current_threshold: Some(30.0),
            ..ConfigBuilder::default()
        }
        .build()?;

        save_config(&path, &config)?;
        assert_eq!(load_config(&path)?, config);
        assert_eq!(load_or_default(Some(&path))?, config);
        Ok(())
    }

    #[test]
    fn test_invalid_config_file_is_rejected() -> Result<()> {
        let (_dir, path) = write_json(
            "config.json",
            &json!({"min_random_branch_chance": 0.9, "max_random_branch_chance": 0.1}),
        )?;
        assert!(load_config(&path).is_err());
        Ok(())
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn test_cli_help_displays_correctly() {
        let output = jukebox(&["--help"]);
        let stdout = String::from_utf8_lossy(&output.stdout);

        assert!(output.status.success());
        assert!(stdout.contains("jukebox"));
        assert!(stdout.contains("graph"));
        assert!(stdout.contains("walk"));
        assert!(stdout.contains("compare"));
    }

    #[test]
    fn test_completion_generation() {
        let output = jukebox(&["completion", "bash"]);
        let stdout = String::from_utf8_lossy(&output.stdout);

        assert!(output.status.success());
        assert!(stdout.contains("_jukebox"));
        assert!(stdout.contains("complete"));
    }

    #[test]
    fn test_graph_json_output() -> Result<()> {
        let (_dir, path) = write_json("song.json", &synthetic_analysis(32, 8))?;
        let output = jukebox(&["graph", path_arg(&path), "--json"]);
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

        let graph: Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(graph["total_beats"], json!(32));
        assert!(!graph["edges"].as_array().map_or(true, Vec::is_empty));
        Ok(())
    }

    #[test]
    fn test_deterministic_walk_is_repeatable() -> Result<()> {
        let (_dir, path) = write_json("song.json", &synthetic_analysis(32, 8))?;
        let args = ["walk", path_arg(&path), "--beats", "100", "--mode", "deterministic"];
        let first = jukebox(&args);
        let second = jukebox(&args);

        assert!(first.status.success());
        assert_eq!(first.stdout, second.stdout);
        assert!(String::from_utf8_lossy(&first.stdout).contains("Played 100 beats"));
        Ok(())
    }

    #[test]
    fn test_compare_identical_files() -> Result<()> {
        let (_dir, path) = write_json("song.json", &synthetic_analysis(32, 8))?;
        let output = jukebox(&["compare", path_arg(&path), path_arg(&path), "--json"]);
        assert!(output.status.success());

        let result: Value = serde_json::from_slice(&output.stdout)?;
        let similarity = result["similarity"].as_f64().unwrap_or_default();
        assert!((similarity - 100.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_config_file_and_overrides() -> Result<()> {
        let (_dir, path) = write_json("config.json", &json!({"max_branches": 2}))?;
        let output = jukebox(&["--config", path_arg(&path), "config", "--just-backwards"]);
        assert!(output.status.success());

        let config: Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(config["max_branches"], json!(2));
        assert_eq!(config["just_backwards"], json!(true));
        Ok(())
    }

    #[test]
    fn test_malformed_analysis_fails() -> Result<()> {
        let mut doc = synthetic_analysis(8, 4);
        doc["segments"][2]["timbre"] = json!([1.0, 2.0]);
        let (_dir, path) = write_json("bad.json", &doc)?;
        let output = jukebox(&["graph", path_arg(&path)]);

        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("segments[2].timbre"));
        Ok(())
    }
}

//! # Jukebox Performance Benchmarks
//!
//! Benchmarks for the hot paths of the engine.
//!
//! ## Benchmark Categories
//!
//! - **Distance Table**: Pairwise beat distances, computed once per track
//! - **Graph Build**: Thresholding and pruning, run on every rebuild
//! - **Selection**: One decision per beat during playback
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark group
//! cargo bench distance
//! cargo bench graph
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use jukebox::analysis::{normalize, RawAnalysis, RawQuantum, RawSegment, TrackAnalysis, TrackInfo};
use jukebox::config::{ConfigBuilder, JukeboxConfig};
use jukebox::distance::{BeatDistances, DistanceWeights};
use jukebox::graph::{DeletedEdges, GraphBuilder};
use jukebox::random::RandomSource;
use jukebox::selection::{select_next, BranchChance};
use std::hint::black_box;

const BEAT: f64 = 0.5;

/// A track whose audio repeats every 32 beats, one segment per beat
fn create_track(beats: usize) -> TrackAnalysis {
    let quanta = |count: usize, len: f64| -> Vec<RawQuantum> {
        (0..count)
            .map(|i| RawQuantum {
                start: Some(i as f64 * len),
                duration: Some(len),
                confidence: Some(1.0),
            })
            .collect()
    };
    let segments = (0..beats)
        .map(|i| {
            let pattern = i % 32;
            let base = pattern as f64;
            RawSegment {
                start: Some(i as f64 * BEAT),
                duration: Some(BEAT),
                confidence: Some(0.5),
                loudness_start: Some(-20.0 + base / 4.0),
                loudness_max: Some(-10.0 + base / 4.0),
                loudness_max_time: Some(0.05),
                pitches: Some((0..12).map(|k| ((k + pattern) % 12) as f64 / 12.0).collect()),
                timbre: Some((0..12).map(|k| base + k as f64).collect()),
            }
        })
        .collect();
    let raw = RawAnalysis {
        sections: quanta(1, beats as f64 * BEAT),
        bars: quanta(beats.div_ceil(4), BEAT * 4.0),
        beats: quanta(beats, BEAT),
        tatums: quanta(beats * 2, BEAT / 2.0),
        segments,
        track: Some(TrackInfo {
            duration: Some(beats as f64 * BEAT),
            tempo: Some(120.0),
            time_signature: Some(4.0),
        }),
    };
    normalize(&raw).expect("benchmark track is valid")
}

fn benchmark_distance_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance");
    let weights = DistanceWeights::default();

    for beats in [128, 512] {
        let track = create_track(beats);
        group.bench_with_input(BenchmarkId::new("beat_distances", beats), &track, |b, track| {
            b.iter(|| BeatDistances::compute(black_box(track), &weights))
        });
    }

    group.finish();
}

fn benchmark_graph_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph");
    let track = create_track(512);
    let default_config = JukeboxConfig::default();
    let builder = GraphBuilder::new(&track, default_config.weights());
    let deleted = DeletedEdges::new();
    let pruned = ConfigBuilder {
        just_backwards: true,
        remove_sequential_branches: true,
        ..ConfigBuilder::default()
    }
    .build()
    .expect("benchmark config is valid");

    group.bench_function("computed_threshold", |b| {
        b.iter(|| builder.build(black_box(&default_config), &deleted))
    });
    group.bench_function("pruned", |b| b.iter(|| builder.build(black_box(&pruned), &deleted)));

    group.finish();
}

fn benchmark_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection");
    let track = create_track(512);
    let config = JukeboxConfig::default();
    let graph = GraphBuilder::new(&track, config.weights()).build(&config, &DeletedEdges::new());
    let chance = BranchChance::new(&config);

    group.bench_function("select_next_walk", |b| {
        let mut rng = RandomSource::seeded(7);
        b.iter(|| {
            let mut beat = 0;
            for _ in 0..1000 {
                beat = select_next(beat, &graph, &config, &mut rng, &chance).map_or(0, |s| s.index);
            }
            black_box(beat)
        })
    });

    group.finish();
}

// Group all benchmarks
criterion_group!(benches, benchmark_distance_table, benchmark_graph_build, benchmark_selection);

criterion_main!(benches);

//! # Quantum Linker
//!
//! Turns a raw, already-analyzed track into a linked hierarchy of time-ordered
//! quanta (sections → bars → beats → tatums) plus the raw audio segments.
//!
//! ## Layout
//!
//! Every level lives in its own flat `Vec`; the vector owns the quanta and all
//! relationships are plain indices:
//!
//! - `prev` / `next` - temporal neighbours on the same level
//! - `parent` / `children` - the enclosing quantum one level up and the
//!   contained quanta one level down
//! - `overlapping_segments` - every segment whose span intersects the quantum
//!
//! Children and segments are assigned with single-pass monotonic scans: the
//! scan pointer never moves backwards as the quantum index grows.
//!
//! ## Validation
//!
//! [`normalize`] checks every numeric field before linking anything and fails
//! with [`JukeboxError::MalformedAnalysis`] naming the first invalid field.

use crate::error::{JukeboxError, Result};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Number of entries in the `pitches` and `timbre` vectors of a segment
pub const FEATURE_LEN: usize = 12;

/// One rhythmic unit as delivered by the analysis service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawQuantum {
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// One analysis window as delivered by the analysis service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub loudness_start: Option<f64>,
    #[serde(default)]
    pub loudness_max: Option<f64>,
    #[serde(default)]
    pub loudness_max_time: Option<f64>,
    #[serde(default)]
    pub pitches: Option<Vec<f64>>,
    #[serde(default)]
    pub timbre: Option<Vec<f64>>,
}

/// Optional track-wide metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub tempo: Option<f64>,
    #[serde(default)]
    pub time_signature: Option<f64>,
}

/// The analysis result exactly as the external service produces it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAnalysis {
    #[serde(default)]
    pub sections: Vec<RawQuantum>,
    #[serde(default)]
    pub bars: Vec<RawQuantum>,
    #[serde(default)]
    pub beats: Vec<RawQuantum>,
    #[serde(default)]
    pub tatums: Vec<RawQuantum>,
    #[serde(default)]
    pub segments: Vec<RawSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<TrackInfo>,
}

impl RawAnalysis {
    /// Parse an analysis document.
    ///
    /// Accepts either the bare analysis object or a job document that wraps it
    /// under an `"analysis"` key.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(inner) = value.get_mut("analysis") {
            value = inner.take();
        }
        serde_json::from_value(value).map_err(|e| JukeboxError::malformed("$", e.to_string()))
    }
}

/// Read and parse an analysis document from disk
pub fn load_analysis_file(path: &Path) -> Result<RawAnalysis> {
    let text = fs::read_to_string(path)?;
    RawAnalysis::from_json_str(&text)
}

/// Hierarchy levels of quanta, coarsest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Sections,
    Bars,
    Beats,
    Tatums,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Sections, Level::Bars, Level::Beats, Level::Tatums];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Level::Sections => "sections",
            Level::Bars => "bars",
            Level::Beats => "beats",
            Level::Tatums => "tatums",
        }
    }
}

/// A linked rhythmic unit
#[derive(Debug, Clone, PartialEq)]
pub struct Quantum {
    pub start: f64,
    pub duration: f64,
    pub confidence: Option<f64>,
    /// Position within its level; equals the index in the level's vector
    pub which: usize,
    pub prev: Option<usize>,
    pub next: Option<usize>,
    pub parent: Option<usize>,
    /// Position among the parent's children
    pub index_in_parent: Option<usize>,
    pub children: Vec<usize>,
    pub first_overlapping_segment: Option<usize>,
    pub overlapping_segments: Vec<usize>,
}

impl Quantum {
    fn new(which: usize, start: f64, duration: f64, confidence: Option<f64>) -> Self {
        Self {
            start,
            duration,
            confidence,
            which,
            prev: None,
            next: None,
            parent: None,
            index_in_parent: None,
            children: Vec::new(),
            first_overlapping_segment: None,
            overlapping_segments: Vec::new(),
        }
    }

    /// Exclusive end of the quantum's span
    #[must_use]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A validated analysis window
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub which: usize,
    pub start: f64,
    pub duration: f64,
    pub confidence: f64,
    pub loudness_start: f64,
    pub loudness_max: f64,
    pub loudness_max_time: f64,
    pub pitches: [f64; FEATURE_LEN],
    pub timbre: [f64; FEATURE_LEN],
}

impl Segment {
    #[must_use]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A normalized, fully linked track. Read-only once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackAnalysis {
    pub sections: Vec<Quantum>,
    pub bars: Vec<Quantum>,
    pub beats: Vec<Quantum>,
    pub tatums: Vec<Quantum>,
    pub segments: Vec<Segment>,
    pub track: Option<TrackInfo>,
}

impl TrackAnalysis {
    #[must_use]
    pub fn level(&self, level: Level) -> &[Quantum] {
        match level {
            Level::Sections => &self.sections,
            Level::Bars => &self.bars,
            Level::Beats => &self.beats,
            Level::Tatums => &self.tatums,
        }
    }
}

/// Validate and link a raw analysis.
///
/// The input is only borrowed; a brand-new [`TrackAnalysis`] is returned.
///
/// # Errors
///
/// [`JukeboxError::MalformedAnalysis`] for the first missing, non-finite or
/// out-of-range field, or for quanta whose starts are not strictly increasing.
///
/// # Examples
///
/// ```
/// use jukebox::analysis::{normalize, RawAnalysis};
///
/// let raw = RawAnalysis::default();
/// let track = normalize(&raw)?;
/// assert!(track.beats.is_empty());
/// # Ok::<(), jukebox::JukeboxError>(())
/// ```
pub fn normalize(raw: &RawAnalysis) -> Result<TrackAnalysis> {
    let mut sections = validate_level(Level::Sections, &raw.sections)?;
    let mut bars = validate_level(Level::Bars, &raw.bars)?;
    let mut beats = validate_level(Level::Beats, &raw.beats)?;
    let mut tatums = validate_level(Level::Tatums, &raw.tatums)?;
    let segments = validate_segments(&raw.segments)?;
    if let Some(track) = &raw.track {
        validate_track_info(track)?;
    }

    for level in [&mut sections, &mut bars, &mut beats, &mut tatums] {
        link_siblings(level);
    }

    connect_children(&mut sections, &mut bars);
    connect_children(&mut bars, &mut beats);
    connect_children(&mut beats, &mut tatums);

    for level in [&mut bars, &mut beats, &mut tatums] {
        connect_first_overlapping_segment(level, &segments);
        connect_overlapping_segments(level, &segments);
    }

    let track = TrackAnalysis {
        sections,
        bars,
        beats,
        tatums,
        segments,
        track: raw.track.clone(),
    };
    let counts: Vec<String> = Level::ALL
        .iter()
        .map(|&level| format!("{} {}", track.level(level).len(), level.name()))
        .collect();
    debug!("Normalized analysis: {}, {} segments", counts.join(", "), track.segments.len());
    Ok(track)
}

fn require(value: Option<f64>, path: impl FnOnce() -> String) -> Result<f64> {
    match value {
        None => Err(JukeboxError::malformed(path(), "required field is missing")),
        Some(v) if !v.is_finite() => Err(JukeboxError::malformed(path(), "value is not finite")),
        Some(v) => Ok(v),
    }
}

fn check_confidence(value: Option<f64>, path: impl FnOnce() -> String) -> Result<Option<f64>> {
    match value {
        None => Ok(None),
        Some(c) if c.is_finite() && (0.0..=1.0).contains(&c) => Ok(Some(c)),
        Some(_) => Err(JukeboxError::malformed(path(), "confidence must be within [0, 1]")),
    }
}

fn validate_level(level: Level, raw: &[RawQuantum]) -> Result<Vec<Quantum>> {
    let name = level.name();
    let mut quanta: Vec<Quantum> = Vec::with_capacity(raw.len());

    for (i, q) in raw.iter().enumerate() {
        let start = require(q.start, || format!("{name}[{i}].start"))?;
        if start < 0.0 {
            return Err(JukeboxError::malformed(format!("{name}[{i}].start"), "must not be negative"));
        }
        let duration = require(q.duration, || format!("{name}[{i}].duration"))?;
        if duration <= 0.0 {
            return Err(JukeboxError::malformed(format!("{name}[{i}].duration"), "must be positive"));
        }
        let confidence = check_confidence(q.confidence, || format!("{name}[{i}].confidence"))?;

        if let Some(prev) = quanta.last() {
            if start <= prev.start {
                return Err(JukeboxError::malformed(
                    format!("{name}[{i}].start"),
                    format!("must be greater than the previous start {}", prev.start),
                ));
            }
        }
        quanta.push(Quantum::new(i, start, duration, confidence));
    }

    Ok(quanta)
}

fn feature_vector(values: Option<&Vec<f64>>, path: &str) -> Result<[f64; FEATURE_LEN]> {
    let values = values.ok_or_else(|| JukeboxError::malformed(path, "required field is missing"))?;
    if values.len() != FEATURE_LEN {
        return Err(JukeboxError::malformed(
            path,
            format!("expected {FEATURE_LEN} values, found {}", values.len()),
        ));
    }
    let mut out = [0.0; FEATURE_LEN];
    for (k, v) in values.iter().enumerate() {
        if !v.is_finite() {
            return Err(JukeboxError::malformed(format!("{path}[{k}]"), "value is not finite"));
        }
        out[k] = *v;
    }
    Ok(out)
}

fn validate_segments(raw: &[RawSegment]) -> Result<Vec<Segment>> {
    let mut segments: Vec<Segment> = Vec::with_capacity(raw.len());

    for (i, s) in raw.iter().enumerate() {
        let start = require(s.start, || format!("segments[{i}].start"))?;
        if start < 0.0 {
            return Err(JukeboxError::malformed(format!("segments[{i}].start"), "must not be negative"));
        }
        let duration = require(s.duration, || format!("segments[{i}].duration"))?;
        if duration <= 0.0 {
            return Err(JukeboxError::malformed(format!("segments[{i}].duration"), "must be positive"));
        }
        if let Some(prev) = segments.last() {
            if start <= prev.start {
                return Err(JukeboxError::malformed(
                    format!("segments[{i}].start"),
                    format!("must be greater than the previous start {}", prev.start),
                ));
            }
        }

        segments.push(Segment {
            which: i,
            start,
            duration,
            confidence: check_confidence(s.confidence, || format!("segments[{i}].confidence"))?
                .unwrap_or(0.0),
            loudness_start: require(s.loudness_start, || format!("segments[{i}].loudness_start"))?,
            loudness_max: require(s.loudness_max, || format!("segments[{i}].loudness_max"))?,
            loudness_max_time: require(s.loudness_max_time, || {
                format!("segments[{i}].loudness_max_time")
            })?,
            pitches: feature_vector(s.pitches.as_ref(), &format!("segments[{i}].pitches"))?,
            timbre: feature_vector(s.timbre.as_ref(), &format!("segments[{i}].timbre"))?,
        });
    }

    Ok(segments)
}

fn validate_track_info(track: &TrackInfo) -> Result<()> {
    let fields = [
        ("track.duration", track.duration),
        ("track.tempo", track.tempo),
        ("track.time_signature", track.time_signature),
    ];
    for (path, value) in fields {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(JukeboxError::malformed(path, "must be a finite, non-negative number"));
            }
        }
    }
    Ok(())
}

fn link_siblings(quanta: &mut [Quantum]) {
    let len = quanta.len();
    for (i, q) in quanta.iter_mut().enumerate() {
        q.which = i;
        q.prev = i.checked_sub(1);
        q.next = (i + 1 < len).then_some(i + 1);
    }
}

/// A child belongs to the first parent whose span contains its start.
/// Children starting before a parent (gaps, lead-in) stay orphaned.
fn connect_children(parents: &mut [Quantum], children: &mut [Quantum]) {
    let mut last = 0;
    for (p, parent) in parents.iter_mut().enumerate() {
        parent.children.clear();
        while last < children.len() {
            let child = &mut children[last];
            if child.start < parent.start {
                last += 1;
                continue;
            }
            if child.start >= parent.end() {
                break;
            }
            child.parent = Some(p);
            child.index_in_parent = Some(parent.children.len());
            parent.children.push(last);
            last += 1;
        }
    }
}

fn connect_first_overlapping_segment(quanta: &mut [Quantum], segments: &[Segment]) {
    let mut last = 0;
    for q in quanta.iter_mut() {
        while last < segments.len() && segments[last].start < q.start {
            last += 1;
        }
        q.first_overlapping_segment = (last < segments.len()).then_some(last);
    }
}

/// Half-open overlap: `[seg.start, seg.end)` intersects `[q.start, q.end)`.
fn connect_overlapping_segments(quanta: &mut [Quantum], segments: &[Segment]) {
    let mut last = 0;
    for q in quanta.iter_mut() {
        while last < segments.len() && segments[last].end() <= q.start {
            last += 1;
        }
        q.overlapping_segments = segments[last..]
            .iter()
            .take_while(|seg| seg.start < q.end())
            .filter(|seg| seg.end() > q.start)
            .map(|seg| seg.which)
            .collect();
        trace!("Quantum {} overlaps {} segments", q.which, q.overlapping_segments.len());
    }
}

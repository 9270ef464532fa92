//! # Configuration Module
//!
//! This module holds the jukebox tunables and the helpers that locate and
//! load them from disk.
//!
//! ## Tunables
//!
//! [`JukeboxConfig`] is an immutable, validated snapshot. It is built through
//! [`ConfigBuilder`] (plain public fields plus `build()`), or deserialized from
//! JSON, which goes through the same validation. Replacing the configuration
//! of a running player triggers a graph rebuild.
//!
//! ## Config File Location
//!
//! The CLI looks for `config.json` in the platform-standard config directory:
//! - Linux: `~/.config/jukebox/`
//! - macOS: `~/Library/Application Support/jukebox/`
//! - Windows: `%APPDATA%\jukebox\`

use crate::distance::DistanceWeights;
use crate::error::{JukeboxError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Mutable draft of a [`JukeboxConfig`].
///
/// Every field has a default, so drafts are usually written as struct
/// literals with `..ConfigBuilder::default()`.
///
/// # Examples
///
/// ```
/// use jukebox::config::ConfigBuilder;
///
/// let config = ConfigBuilder {
///     max_branches: 2,
///     just_backwards: true,
///     ..ConfigBuilder::default()
/// }
/// .build()?;
/// assert_eq!(config.max_branches(), 2);
/// # Ok::<(), jukebox::JukeboxError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigBuilder {
    /// Cap on retained edges per beat
    pub max_branches: usize,
    /// Upper bound on any threshold, explicit or computed
    pub max_branch_threshold: f64,
    /// Explicit similarity cutoff; `None` derives one from the track
    pub current_threshold: Option<f64>,
    /// Guarantee a loop-back edge near the end of the track
    pub add_last_edge: bool,
    /// Keep only jumps to earlier beats
    pub just_backwards: bool,
    /// Drop jumps spanning fewer than `min_long_branch` beats
    pub just_long_branches: bool,
    /// Minimum jump span; `None` means a fifth of the track
    pub min_long_branch: Option<usize>,
    /// Keep only the stronger of two edges to adjacent destinations
    pub remove_sequential_branches: bool,
    pub min_random_branch_chance: f64,
    pub max_random_branch_chance: f64,
    /// Ramp step applied after every sequential beat
    pub random_branch_chance_delta: f64,
    pub weights: DistanceWeights,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            max_branches: 4,
            max_branch_threshold: 80.0,
            current_threshold: None,
            add_last_edge: true,
            just_backwards: false,
            just_long_branches: false,
            min_long_branch: None,
            remove_sequential_branches: false,
            min_random_branch_chance: 0.18,
            max_random_branch_chance: 0.5,
            random_branch_chance_delta: 0.018,
            weights: DistanceWeights::default(),
        }
    }
}

impl ConfigBuilder {
    /// Validate the draft and freeze it.
    ///
    /// # Errors
    ///
    /// [`JukeboxError::InvalidConfig`] describing the first rejected value.
    pub fn build(self) -> Result<JukeboxConfig> {
        self.validate()?;
        Ok(JukeboxConfig(self))
    }

    fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(JukeboxError::InvalidConfig(msg));

        if self.max_branches == 0 {
            return invalid("max_branches must be at least 1".to_string());
        }
        if !self.max_branch_threshold.is_finite() || self.max_branch_threshold <= 0.0 {
            return invalid(format!(
                "max_branch_threshold must be a positive number, got {}",
                self.max_branch_threshold
            ));
        }
        if let Some(t) = self.current_threshold {
            if !t.is_finite() || t < 0.0 {
                return invalid(format!("current_threshold must be a non-negative number, got {t}"));
            }
        }
        for (name, chance) in [
            ("min_random_branch_chance", self.min_random_branch_chance),
            ("max_random_branch_chance", self.max_random_branch_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                return invalid(format!("{name} must be within [0, 1], got {chance}"));
            }
        }
        if self.min_random_branch_chance > self.max_random_branch_chance {
            return invalid(format!(
                "min_random_branch_chance ({}) exceeds max_random_branch_chance ({})",
                self.min_random_branch_chance, self.max_random_branch_chance
            ));
        }
        if !self.random_branch_chance_delta.is_finite() || self.random_branch_chance_delta < 0.0 {
            return invalid(format!(
                "random_branch_chance_delta must be a non-negative number, got {}",
                self.random_branch_chance_delta
            ));
        }
        let w = &self.weights;
        let weights = [
            w.timbre,
            w.pitch,
            w.loudness_start,
            w.loudness_max,
            w.duration,
            w.confidence,
            w.missing_segment_penalty,
            w.position_penalty,
        ];
        if weights.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return invalid("distance weights must be non-negative numbers".to_string());
        }
        Ok(())
    }
}

/// Validated, immutable jukebox tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConfigBuilder", into = "ConfigBuilder")]
pub struct JukeboxConfig(ConfigBuilder);

impl TryFrom<ConfigBuilder> for JukeboxConfig {
    type Error = JukeboxError;

    fn try_from(draft: ConfigBuilder) -> Result<Self> {
        draft.build()
    }
}

impl From<JukeboxConfig> for ConfigBuilder {
    fn from(config: JukeboxConfig) -> Self {
        config.0
    }
}

impl Default for JukeboxConfig {
    fn default() -> Self {
        Self(ConfigBuilder::default())
    }
}

impl JukeboxConfig {
    /// Start a new draft from the defaults
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Copy this configuration into a draft for modification
    #[must_use]
    pub fn to_builder(&self) -> ConfigBuilder {
        self.0.clone()
    }

    #[must_use]
    pub fn max_branches(&self) -> usize {
        self.0.max_branches
    }

    #[must_use]
    pub fn max_branch_threshold(&self) -> f64 {
        self.0.max_branch_threshold
    }

    #[must_use]
    pub fn current_threshold(&self) -> Option<f64> {
        self.0.current_threshold
    }

    #[must_use]
    pub fn add_last_edge(&self) -> bool {
        self.0.add_last_edge
    }

    #[must_use]
    pub fn just_backwards(&self) -> bool {
        self.0.just_backwards
    }

    #[must_use]
    pub fn just_long_branches(&self) -> bool {
        self.0.just_long_branches
    }

    /// Minimum jump span for a track of `total_beats` beats
    #[must_use]
    pub fn min_long_branch(&self, total_beats: usize) -> usize {
        self.0.min_long_branch.unwrap_or(total_beats / 5)
    }

    #[must_use]
    pub fn remove_sequential_branches(&self) -> bool {
        self.0.remove_sequential_branches
    }

    #[must_use]
    pub fn min_random_branch_chance(&self) -> f64 {
        self.0.min_random_branch_chance
    }

    #[must_use]
    pub fn max_random_branch_chance(&self) -> f64 {
        self.0.max_random_branch_chance
    }

    #[must_use]
    pub fn random_branch_chance_delta(&self) -> f64 {
        self.0.random_branch_chance_delta
    }

    #[must_use]
    pub fn weights(&self) -> &DistanceWeights {
        &self.0.weights
    }
}

/// Returns `<config dir>/jukebox/config.json` for this platform, or `None`
/// when the platform has no config directory. Nothing is created.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("jukebox").join("config.json"))
}

/// Read and validate a JSON configuration file.
///
/// Missing fields take their defaults.
pub fn load_config(path: &Path) -> Result<JukeboxConfig> {
    let text = fs::read_to_string(path)?;
    let config: JukeboxConfig = serde_json::from_str(&text)?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write a configuration as pretty-printed JSON
pub fn save_config(path: &Path, config: &JukeboxConfig) -> Result<()> {
    let text = serde_json::to_string_pretty(config)?;
    fs::write(path, text)?;
    debug!("Saved configuration to {}", path.display());
    Ok(())
}

/// Load `path` when given, else the default file when it exists, else the
/// built-in defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<JukeboxConfig> {
    if let Some(path) = path {
        return load_config(path);
    }
    match default_config_path() {
        Some(default) if default.is_file() => load_config(&default),
        _ => Ok(JukeboxConfig::default()),
    }
}

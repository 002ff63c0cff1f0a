//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field has a default so a partial (or missing) file still yields
//! a usable configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::betting::settlement::RoundingPolicy;
use crate::betting::TimbaSettings;
use crate::rating::RatingSettings;
use crate::types::Credits;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub host: HostConfig,
    pub timba: TimbaConfig,
    pub funes: FunesConfig,
    pub oloraculo: OloraculoConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HostConfig {
    /// Translate Quake color codes into ANSI escapes on stdout.
    pub color_output: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimbaConfig {
    pub enabled: bool,
    pub starting_credits: Credits,
    pub ledger_path: PathBuf,
    /// Short game type names betting is allowed on.
    pub game_types: Vec<String>,
    /// Seconds the betting window stays open after the countdown.
    pub window_secs: u64,
    pub rounding: RoundingPolicy,
}

impl Default for TimbaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            starting_credits: 5000,
            ledger_path: PathBuf::from("timba_credits.json"),
            game_types: vec!["ad".to_string(), "ctf".to_string()],
            window_secs: 30,
            rounding: RoundingPolicy::default(),
        }
    }
}

impl TimbaConfig {
    pub fn settings(&self) -> TimbaSettings {
        TimbaSettings {
            starting_credits: self.starting_credits,
            ledger_path: self.ledger_path.clone(),
            game_types: self.game_types.clone(),
            window: Duration::from_secs(self.window_secs),
            rounding: self.rounding,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FunesConfig {
    pub enabled: bool,
    pub history_path: PathBuf,
}

impl Default for FunesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history_path: PathBuf::from("funes_history.json"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OloraculoConfig {
    pub enabled: bool,
    pub stats_path: PathBuf,
    /// Short game type names that are rated.
    pub game_types: Vec<String>,
}

impl Default for OloraculoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stats_path: PathBuf::from("oloraculo_stats.json"),
            game_types: vec!["ad".to_string(), "ctf".to_string()],
        }
    }
}

impl OloraculoConfig {
    pub fn settings(&self) -> RatingSettings {
        RatingSettings {
            stats_path: self.stats_path.clone(),
            game_types: self.game_types.clone(),
            ..RatingSettings::default()
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }
}

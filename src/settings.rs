use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::DisplayOptions;
use crate::playback::EndOfDataPolicy;

/// Persistent player settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds of playback time added per timer tick
    pub tick_increment: f64,
    /// Wall-clock cadence of the timer in milliseconds
    pub refresh_interval_ms: u64,
    pub end_of_data: EndOfDataPolicy,
    /// Display options for entities created without explicit ones
    pub default_display: DisplayOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_increment: 1.0,
            refresh_interval_ms: 1000,
            end_of_data: EndOfDataPolicy::EveryCall,
            default_display: DisplayOptions::default(),
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("geoplay").join("settings.json"))
    }

    /// Settings from the config directory, or defaults when missing or unreadable
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|err| {
                warn!("ignoring settings at {}: {err:#}", path.display());
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Self = serde_json::from_str(&contents).context("Invalid settings JSON")?;
        positive_seconds(settings.tick_increment).context("Invalid tick_increment")?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().context("No config directory on this platform")?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Accepts finite durations above zero
pub fn positive_seconds(seconds: f64) -> Result<f64> {
    if !seconds.is_finite() || seconds <= 0.0 {
        bail!("expected a positive number of seconds, got {seconds}");
    }
    Ok(seconds)
}

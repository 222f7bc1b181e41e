//! Configuration types for the monitor.
//!
//! Loaded from config.json at startup. Provides region geometry, the
//! preprocessing/filter constants, cadences, cooldowns and the settings of
//! the lookup and narrator adapters.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Which watched screen area a frame or lookup belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RegionKind {
    /// Live list of nearby players.
    Proximity,
    /// Overlay shown after the player is eliminated.
    Death,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKind::Proximity => write!(f, "Proximity"),
            RegionKind::Death => write!(f, "Death"),
        }
    }
}

/// A screen rectangle in pixels, relative to the selected monitor's origin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Settings for the bounty board lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Search page URL; `{name}` is replaced by the player name.
    pub search_url: String,
    /// Upper bound for each HTTP request made by one lookup.
    pub timeout_secs: u64,
    /// Model used to summarize bounty listings.
    pub summary_model: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            search_url: "https://speranzabounties.com/?search={name}".to_string(),
            timeout_secs: 30,
            summary_model: "gemini-2.5-flash".to_string(),
        }
    }
}

/// Settings for spoken narration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorConfig {
    pub enabled: bool,
    /// Custom speech command as argv. Supports `{text}`, `{voice}` and
    /// `{device}` placeholders; without `{text}` the text is piped to stdin.
    pub command: Option<Vec<String>>,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: None,
        }
    }
}

/// Complete monitor configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// 1-based monitor number
    #[serde(default = "default_monitor_index")]
    pub monitor_index: u32,
    /// Audio output device, passed to custom narrator commands as `{device}`
    #[serde(default)]
    pub audio_device: u32,
    /// Voice name for the narrator
    #[serde(default)]
    pub tts_voice: Option<String>,
    #[serde(default = "default_proximity_region")]
    pub proximity_region: ScreenRegion,
    #[serde(default = "default_death_region")]
    pub death_region: ScreenRegion,
    /// Width of the icon column cropped from the upscaled proximity frame
    #[serde(default = "default_icon_crop")]
    pub icon_crop: u32,
    #[serde(default = "default_upscale_factor")]
    pub upscale_factor: u32,
    #[serde(default = "default_proximity_threshold")]
    pub proximity_threshold: u8,
    #[serde(default = "default_death_threshold")]
    pub death_threshold: u8,
    /// Proximity lines at or below this confidence (0-1) are dropped
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Recognizer artifacts that are never player names (exact match)
    #[serde(default = "default_proximity_blacklist")]
    pub proximity_blacklist: Vec<String>,
    /// Stat popup words that mean the death parser hit a stats line
    #[serde(default = "default_death_stat_markers")]
    pub death_stat_markers: Vec<String>,
    #[serde(default = "default_proximity_interval_ms")]
    pub proximity_interval_ms: u64,
    #[serde(default = "default_death_interval_ms")]
    pub death_interval_ms: u64,
    #[serde(default = "default_proximity_cooldown_secs")]
    pub proximity_cooldown_secs: u64,
    #[serde(default = "default_death_cooldown_secs")]
    pub death_cooldown_secs: u64,
    /// Minimum gap between two re-encounter reminders for the same name
    #[serde(default = "default_reminder_interval_secs")]
    pub reminder_interval_secs: u64,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub narrator: NarratorConfig,
    /// Explicit tesseract executable, searched for when absent
    #[serde(default)]
    pub tesseract_path: Option<String>,
    /// Tesseract `--psm` value
    #[serde(default = "default_page_segmentation")]
    pub page_segmentation: u8,
}

fn default_monitor_index() -> u32 {
    1
}

fn default_proximity_region() -> ScreenRegion {
    ScreenRegion {
        x: 0,
        y: 730,
        width: 233,
        height: 152,
    }
}

fn default_death_region() -> ScreenRegion {
    ScreenRegion {
        x: 990,
        y: 580,
        width: 600,
        height: 300,
    }
}

fn default_icon_crop() -> u32 {
    65
}

fn default_upscale_factor() -> u32 {
    3
}

fn default_proximity_threshold() -> u8 {
    170
}

fn default_death_threshold() -> u8 {
    127
}

fn default_min_confidence() -> f32 {
    0.6
}

fn default_proximity_blacklist() -> Vec<String> {
    ["DETECTED", "SEARCHING", "Intel"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_death_stat_markers() -> Vec<String> {
    ["DAMAGE", "HEALTH", "ANVIL"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_proximity_interval_ms() -> u64 {
    500
}

fn default_death_interval_ms() -> u64 {
    2500
}

fn default_proximity_cooldown_secs() -> u64 {
    1800
}

fn default_death_cooldown_secs() -> u64 {
    300
}

fn default_reminder_interval_secs() -> u64 {
    60
}

fn default_page_segmentation() -> u8 {
    6
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            monitor_index: default_monitor_index(),
            audio_device: 0,
            tts_voice: None,
            proximity_region: default_proximity_region(),
            death_region: default_death_region(),
            icon_crop: default_icon_crop(),
            upscale_factor: default_upscale_factor(),
            proximity_threshold: default_proximity_threshold(),
            death_threshold: default_death_threshold(),
            min_confidence: default_min_confidence(),
            proximity_blacklist: default_proximity_blacklist(),
            death_stat_markers: default_death_stat_markers(),
            proximity_interval_ms: default_proximity_interval_ms(),
            death_interval_ms: default_death_interval_ms(),
            proximity_cooldown_secs: default_proximity_cooldown_secs(),
            death_cooldown_secs: default_death_cooldown_secs(),
            reminder_interval_secs: default_reminder_interval_secs(),
            lookup: LookupConfig::default(),
            narrator: NarratorConfig::default(),
            tesseract_path: None,
            page_segmentation: default_page_segmentation(),
        }
    }
}

impl MonitorConfig {
    /// Returns the configured rectangle for a region.
    pub fn region(&self, kind: RegionKind) -> ScreenRegion {
        match kind {
            RegionKind::Proximity => self.proximity_region,
            RegionKind::Death => self.death_region,
        }
    }
}

/// Loads configuration from `path` or returns defaults.
///
/// A missing, unreadable or malformed file is logged and never fatal.
pub fn load_config(path: &Path) -> MonitorConfig {
    crate::log(&format!("Looking for config at: {}", path.display()));

    if path.exists() {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    crate::log("Config loaded from config.json");
                    return config;
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse config.json: {}. Using defaults.",
                        e
                    ));
                }
            },
            Err(e) => {
                crate::log(&format!(
                    "Failed to read config.json: {}. Using defaults.",
                    e
                ));
            }
        }
    } else {
        crate::log("config.json not found. Using default config.");
    }

    MonitorConfig::default()
}

/// Writes the configuration as pretty JSON.
pub fn save_config(path: &Path, config: &MonitorConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "monitor_index": 2, "icon_crop": 40 }"#).unwrap();

        let config = load_config(&path);
        assert_eq!(config.monitor_index, 2);
        assert_eq!(config.icon_crop, 40);
        assert_eq!(config.proximity_cooldown_secs, 1800);
        assert_eq!(config.death_cooldown_secs, 300);
        assert_eq!(config.proximity_region, default_proximity_region());
        assert_eq!(config.lookup, LookupConfig::default());
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(load_config(&path), MonitorConfig::default());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        assert_eq!(
            load_config(&dir.path().join("absent.json")),
            MonitorConfig::default()
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = MonitorConfig::default();
        config.death_region = ScreenRegion {
            x: 10,
            y: 20,
            width: 300,
            height: 100,
        };
        config.tts_voice = Some("Zira".to_string());
        save_config(&path, &config).unwrap();

        assert_eq!(load_config(&path), config);
    }

    #[test]
    fn test_region_lookup_by_kind() {
        let config = MonitorConfig::default();
        assert_eq!(config.region(RegionKind::Proximity).y, 730);
        assert_eq!(config.region(RegionKind::Death).x, 990);
    }
}

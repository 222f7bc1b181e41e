//! GUI application state.
//!
//! Holds form input and the settings draft between frames. The service owns
//! everything else.

use std::collections::HashMap;

use crate::capture::MonitorInfo;
use crate::monitor::config::{MonitorConfig, ScreenRegion};
use crate::monitor::registry::{PlayerRecord, PlayerStatus};

/// Which panel is shown below the controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Activity,
    History,
    Settings,
}

/// Editable copy of the settings exposed in the GUI.
#[derive(Clone, Debug, PartialEq)]
pub struct SettingsDraft {
    pub monitor_index: u32,
    pub audio_device: u32,
    pub tts_voice: String,
    pub narrator_enabled: bool,
    pub proximity_region: ScreenRegion,
    pub death_region: ScreenRegion,
    pub icon_crop: u32,
}

impl SettingsDraft {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            monitor_index: config.monitor_index,
            audio_device: config.audio_device,
            tts_voice: config.tts_voice.clone().unwrap_or_default(),
            narrator_enabled: config.narrator.enabled,
            proximity_region: config.proximity_region,
            death_region: config.death_region,
            icon_crop: config.icon_crop,
        }
    }

    /// Writes the draft over `config`, leaving fields the GUI does not edit
    /// untouched.
    pub fn apply_to(&self, config: &mut MonitorConfig) {
        config.monitor_index = self.monitor_index.max(1);
        config.audio_device = self.audio_device;
        let voice = self.tts_voice.trim();
        config.tts_voice = (!voice.is_empty()).then(|| voice.to_string());
        config.narrator.enabled = self.narrator_enabled;
        config.proximity_region = self.proximity_region;
        config.death_region = self.death_region;
        config.icon_crop = self.icon_crop;
    }
}

/// GUI application state.
#[derive(Debug)]
pub struct GuiState {
    pub tab: Tab,
    pub note_name: String,
    pub note_text: String,
    /// Result of the last note or settings action.
    pub feedback: Option<String>,
    pub settings: SettingsDraft,
    /// In-progress note edits from the history grid, keyed by player name.
    pub note_drafts: HashMap<String, String>,
}

impl GuiState {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            tab: Tab::default(),
            note_name: String::new(),
            note_text: String::new(),
            feedback: None,
            settings: SettingsDraft::from_config(config),
            note_drafts: HashMap::new(),
        }
    }

    /// Re-seeds the history grid's note fields from a fresh snapshot.
    pub fn reset_note_drafts(&mut self, records: &[PlayerRecord]) {
        self.note_drafts = records
            .iter()
            .map(|r| (r.name.to_string(), r.note.clone()))
            .collect();
    }
}

/// The note to save for a history row, if its draft differs from the record.
pub fn changed_note(record: &PlayerRecord, draft: &str) -> Option<String> {
    (draft != record.note).then(|| draft.to_string())
}

/// Text for the monitor picker, including a configured monitor that is not
/// currently attached.
pub fn monitor_label(monitors: &[MonitorInfo], index: u32) -> String {
    monitors
        .iter()
        .find(|m| m.index == index)
        .map(MonitorInfo::label)
        .unwrap_or_else(|| format!("Monitor {} (not connected)", index))
}

/// Display size for a preview texture, shrunk to fit `max_width`.
pub fn fit_to_width(size: [usize; 2], max_width: f32) -> [f32; 2] {
    let [w, h] = size.map(|v| v as f32);
    if w <= 0.0 || w <= max_width {
        return [w, h];
    }
    let scale = max_width / w;
    [max_width, h * scale]
}

/// Row color for a status, as RGB.
pub fn status_rgb(status: PlayerStatus) -> [u8; 3] {
    match status {
        PlayerStatus::Bounty => [220, 60, 60],
        PlayerStatus::Clean => [80, 180, 90],
        PlayerStatus::Queued => [200, 170, 60],
        PlayerStatus::ManualEntry => [90, 140, 220],
        PlayerStatus::Unknown => [150, 150, 150],
    }
}

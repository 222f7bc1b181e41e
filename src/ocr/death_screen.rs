//! Killer name extraction from the death overlay.
//!
//! The overlay has no fixed layout, so the parser anchors on the "knocked
//! out" line and takes the line right below it as the name. Stat popups can
//! sit in that slot; they are recognized by marker words and dropped.

use std::fmt;

use super::engine::DetectionLine;
use super::extract::strip_to_name_chars;
use crate::monitor::config::MonitorConfig;
use crate::monitor::registry::PlayerName;

/// Both raw and normalized candidates must be longer than this.
const MIN_KILLER_NAME_LEN: usize = 2;

/// Parser states. One pass per frame, nothing carried across frames.
#[derive(Debug, Clone, PartialEq)]
pub enum DeathScreenState {
    /// Looking for the trigger line
    Scanning,
    /// Trigger found at this index of the sorted lines
    TriggerFound(usize),
    /// Finished with a verdict
    Done(DeathScreenVerdict),
}

/// Outcome of parsing one frame. Only `Killer` carries a result; all other
/// verdicts are ordinary non-matches.
#[derive(Debug, Clone, PartialEq)]
pub enum DeathScreenVerdict {
    /// No "knocked out" line in the frame
    NoTrigger,
    /// Trigger was the last line
    NoCandidate,
    /// The line below the trigger is a stat popup
    StatOverlay(String),
    /// Candidate too short before or after normalization
    Rejected(String),
    Killer(PlayerName),
}

impl DeathScreenVerdict {
    pub fn killer(self) -> Option<PlayerName> {
        match self {
            DeathScreenVerdict::Killer(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for DeathScreenVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeathScreenVerdict::NoTrigger => write!(f, "No trigger line"),
            DeathScreenVerdict::NoCandidate => write!(f, "Nothing below trigger"),
            DeathScreenVerdict::StatOverlay(text) => write!(f, "Stat overlay: {}", text),
            DeathScreenVerdict::Rejected(text) => write!(f, "Rejected candidate: {}", text),
            DeathScreenVerdict::Killer(name) => write!(f, "Killer: {}", name),
        }
    }
}

/// Positional parser over the lines of one death-region frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DeathScreenParser {
    /// Uppercase markers of stat popups
    stat_markers: Vec<String>,
}

impl Default for DeathScreenParser {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

impl DeathScreenParser {
    pub fn new<S: AsRef<str>>(stat_markers: &[S]) -> Self {
        Self {
            stat_markers: stat_markers
                .iter()
                .map(|m| m.as_ref().to_uppercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(&config.death_stat_markers)
    }

    pub fn parse(&self, lines: &[DetectionLine]) -> DeathScreenVerdict {
        let mut sorted: Vec<&DetectionLine> = lines.iter().collect();
        sorted.sort_by(|a, b| a.top.total_cmp(&b.top));

        let mut state = DeathScreenState::Scanning;
        loop {
            state = match state {
                DeathScreenState::Scanning => match sorted.iter().position(|l| is_trigger(&l.text)) {
                    Some(idx) => DeathScreenState::TriggerFound(idx),
                    None => DeathScreenState::Done(DeathScreenVerdict::NoTrigger),
                },
                DeathScreenState::TriggerFound(idx) => match sorted.get(idx + 1) {
                    Some(next) => DeathScreenState::Done(self.judge_candidate(&next.text)),
                    None => DeathScreenState::Done(DeathScreenVerdict::NoCandidate),
                },
                DeathScreenState::Done(verdict) => return verdict,
            };
        }
    }

    fn judge_candidate(&self, raw: &str) -> DeathScreenVerdict {
        let upper = raw.to_uppercase();
        if self.stat_markers.iter().any(|m| upper.contains(m.as_str())) {
            return DeathScreenVerdict::StatOverlay(raw.to_string());
        }
        if raw.chars().count() <= MIN_KILLER_NAME_LEN {
            return DeathScreenVerdict::Rejected(raw.to_string());
        }

        let normalized = strip_to_name_chars(raw);
        if normalized.chars().count() <= MIN_KILLER_NAME_LEN {
            return DeathScreenVerdict::Rejected(raw.to_string());
        }
        match PlayerName::new(&normalized) {
            Some(name) => DeathScreenVerdict::Killer(name),
            None => DeathScreenVerdict::Rejected(raw.to_string()),
        }
    }
}

fn is_trigger(text: &str) -> bool {
    let upper = text.to_uppercase();
    upper.contains("KNOCKED") && upper.contains("OUT")
}

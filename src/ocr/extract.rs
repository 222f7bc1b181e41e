//! Turns recognized proximity-list lines into player name candidates.

use super::engine::DetectionLine;
use crate::monitor::config::MonitorConfig;
use crate::monitor::registry::PlayerName;

/// Names must be longer than this after normalization.
const MIN_PROXIMITY_NAME_LEN: usize = 3;

/// Acceptance policy for proximity lines.
#[derive(Clone, Debug, PartialEq)]
pub struct ProximityFilter {
    /// Lines at or below this confidence are dropped
    pub min_confidence: f32,
    /// Status placeholders the game UI shows in the list itself
    pub blacklist: Vec<String>,
}

impl Default for ProximityFilter {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

impl ProximityFilter {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            blacklist: config.proximity_blacklist.clone(),
        }
    }

    /// Applies the policy to a single line.
    pub fn accept(&self, line: &DetectionLine) -> Option<PlayerName> {
        if line.confidence <= self.min_confidence {
            return None;
        }

        let name = strip_to_word_chars(&line.text);
        if name.chars().count() <= MIN_PROXIMITY_NAME_LEN {
            return None;
        }
        if self.blacklist.iter().any(|b| *b == name) {
            return None;
        }

        PlayerName::new(&name)
    }
}

/// Extracts the candidate names of one proximity frame.
///
/// A name seen on several lines of the same frame is returned once, in order
/// of first appearance. Cross-frame dedup is the registry's job.
pub fn extract_proximity_names(lines: &[DetectionLine], filter: &ProximityFilter) -> Vec<PlayerName> {
    let mut names: Vec<PlayerName> = Vec::new();
    for line in lines {
        if let Some(name) = filter.accept(line) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Keeps alphanumeric characters and underscores.
pub fn strip_to_word_chars(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Keeps alphanumeric characters, underscores and hyphens.
pub fn strip_to_name_chars(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

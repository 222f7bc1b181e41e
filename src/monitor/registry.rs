//! Durable, cooldown-aware player store.
//!
//! The whole mapping lives in memory behind one mutex and is rewritten to
//! disk after every mutation. The lock is held across the full
//! read-modify-persist sequence so a note edit cannot lose a concurrent
//! sighting update, and writes reach the file in mutation order.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A normalized player name: non-empty, alphanumerics, `_` and `-` only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerName(String);

impl PlayerName {
    /// Validates an already-normalized name.
    pub fn new(name: &str) -> Option<Self> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
        valid.then(|| Self(name.to_string()))
    }

    /// Normalizes free text (e.g. typed by the user) into a name.
    pub fn normalize(raw: &str) -> Option<Self> {
        Self::new(&crate::ocr::extract::strip_to_name_chars(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerStatus {
    Unknown,
    Queued,
    Clean,
    Bounty,
    ManualEntry,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerStatus::Unknown => write!(f, "Unknown"),
            PlayerStatus::Queued => write!(f, "Queued..."),
            PlayerStatus::Clean => write!(f, "Clean"),
            PlayerStatus::Bounty => write!(f, "Bounty"),
            PlayerStatus::ManualEntry => write!(f, "Manual Entry"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: PlayerName,
    pub last_seen_at: DateTime<Utc>,
    pub status: PlayerStatus,
    #[serde(default)]
    pub details: String,
    /// Written only by note edits and record creation
    #[serde(default)]
    pub note: String,
}

/// What a note edit did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteChange {
    Updated,
    Created,
}

pub struct PlayerRegistry {
    path: Option<PathBuf>,
    players: Mutex<HashMap<PlayerName, PlayerRecord>>,
}

impl PlayerRegistry {
    /// Loads the mapping file. A missing or corrupted file starts empty.
    pub fn load(path: &Path) -> Self {
        let players = match read_mapping(path) {
            Ok(players) => {
                crate::log(&format!(
                    "Loaded {} players from {}",
                    players.len(),
                    path.display()
                ));
                players
            }
            Err(e) => {
                if path.exists() {
                    crate::log(&format!(
                        "Player history unreadable ({:#}), starting empty",
                        e
                    ));
                }
                HashMap::new()
            }
        };

        Self {
            path: Some(path.to_path_buf()),
            players: Mutex::new(players),
        }
    }

    /// A registry that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            players: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, name: &PlayerName) -> Option<PlayerRecord> {
        self.lock().get(name).cloned()
    }

    pub fn upsert(
        &self,
        name: &PlayerName,
        status: PlayerStatus,
        details: Option<&str>,
    ) -> PlayerRecord {
        self.upsert_at(name, status, details, Utc::now())
    }

    /// Creates or updates a record as of `now`.
    ///
    /// Existing records get a new `last_seen_at` and status; details only
    /// change when given. The note is never touched.
    pub fn upsert_at(
        &self,
        name: &PlayerName,
        status: PlayerStatus,
        details: Option<&str>,
        now: DateTime<Utc>,
    ) -> PlayerRecord {
        let mut players = self.lock();
        let record = players
            .entry(name.clone())
            .and_modify(|r| {
                r.last_seen_at = now;
                r.status = status;
                if let Some(d) = details {
                    r.details = d.to_string();
                }
            })
            .or_insert_with(|| PlayerRecord {
                name: name.clone(),
                last_seen_at: now,
                status,
                details: details.unwrap_or_default().to_string(),
                note: String::new(),
            })
            .clone();
        self.persist(&players);
        record
    }

    /// Refreshes `last_seen_at` of an existing record, leaving everything else.
    /// Returns false when the name is unknown.
    pub fn touch_at(&self, name: &PlayerName, now: DateTime<Utc>) -> bool {
        let mut players = self.lock();
        let Some(record) = players.get_mut(name) else {
            return false;
        };
        record.last_seen_at = now;
        self.persist(&players);
        true
    }

    /// Sets the user note, creating a minimal ManualEntry record if needed.
    pub fn set_note(&self, name: &PlayerName, note: &str) -> NoteChange {
        let mut players = self.lock();
        let change = match players.get_mut(name) {
            Some(record) => {
                record.note = note.to_string();
                NoteChange::Updated
            }
            None => {
                players.insert(
                    name.clone(),
                    PlayerRecord {
                        name: name.clone(),
                        last_seen_at: Utc::now(),
                        status: PlayerStatus::ManualEntry,
                        details: String::new(),
                        note: note.to_string(),
                    },
                );
                NoteChange::Created
            }
        };
        self.persist(&players);
        change
    }

    pub fn clear_all(&self) {
        let mut players = self.lock();
        players.clear();
        self.persist(&players);
    }

    /// All records, most recently seen first.
    pub fn snapshot(&self) -> Vec<PlayerRecord> {
        let mut records: Vec<PlayerRecord> = self.lock().values().cloned().collect();
        records.sort_by(|a, b| {
            b.last_seen_at
                .cmp(&a.last_seen_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        records
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PlayerName, PlayerRecord>> {
        self.players.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Rewrites the mapping file. Failures are logged; memory stays authoritative.
    fn persist(&self, players: &HashMap<PlayerName, PlayerRecord>) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_mapping(path, players) {
            crate::log(&format!("Failed to save player history: {:#}", e));
        }
    }
}

fn read_mapping(path: &Path) -> Result<HashMap<PlayerName, PlayerRecord>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let players: HashMap<PlayerName, PlayerRecord> =
        serde_json::from_str(&contents).context("Failed to parse player history")?;
    Ok(players)
}

/// Writes to a sibling temp file then renames, so a crash never leaves a
/// half-written mapping behind.
fn write_mapping(path: &Path, players: &HashMap<PlayerName, PlayerRecord>) -> Result<()> {
    let json = serde_json::to_string_pretty(players).context("Failed to serialize players")?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn name(s: &str) -> PlayerName {
        PlayerName::new(s).unwrap()
    }

    #[test]
    fn test_player_name_validation() {
        assert!(PlayerName::new("Raider_99-x").is_some());
        assert!(PlayerName::new("").is_none());
        assert!(PlayerName::new("two words").is_none());
        assert_eq!(PlayerName::normalize(" Sky-Walker! ").unwrap().as_str(), "Sky-Walker");
        assert!(PlayerName::normalize("!!!").is_none());
    }

    #[test]
    fn test_upsert_then_get() {
        let registry = PlayerRegistry::in_memory();
        let now = Utc::now();
        registry.upsert_at(&name("A"), PlayerStatus::Clean, None, now);

        let record = registry.get(&name("A")).unwrap();
        assert_eq!(record.status, PlayerStatus::Clean);
        assert_eq!(record.last_seen_at, now);
        assert_eq!(record.details, "");
        assert_eq!(record.note, "");
    }

    #[test]
    fn test_touch_only_moves_last_seen() {
        let registry = PlayerRegistry::in_memory();
        let start = Utc::now();
        registry.upsert_at(&name("A"), PlayerStatus::Bounty, Some("wanted"), start);

        let later = start + Duration::seconds(90);
        assert!(registry.touch_at(&name("A"), later));
        assert!(!registry.touch_at(&name("B"), later));

        let record = registry.get(&name("A")).unwrap();
        assert_eq!(record.last_seen_at, later);
        assert_eq!(record.status, PlayerStatus::Bounty);
        assert_eq!(record.details, "wanted");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_note_leaves_status_and_details() {
        let registry = PlayerRegistry::in_memory();
        registry.upsert(&name("A"), PlayerStatus::Bounty, Some("Extraction Camper"));

        assert_eq!(registry.set_note(&name("A"), "friendly"), NoteChange::Updated);

        let record = registry.get(&name("A")).unwrap();
        assert_eq!(record.status, PlayerStatus::Bounty);
        assert_eq!(record.details, "Extraction Camper");
        assert_eq!(record.note, "friendly");
    }

    #[test]
    fn test_note_creates_manual_entry() {
        let registry = PlayerRegistry::in_memory();
        assert_eq!(registry.set_note(&name("Ghost"), "KOS"), NoteChange::Created);

        let record = registry.get(&name("Ghost")).unwrap();
        assert_eq!(record.status, PlayerStatus::ManualEntry);
        assert_eq!(record.note, "KOS");
    }

    #[test]
    fn test_upsert_never_overwrites_note() {
        let registry = PlayerRegistry::in_memory();
        registry.set_note(&name("A"), "friendly");
        registry.upsert(&name("A"), PlayerStatus::Queued, Some("Death Screen"));
        registry.upsert(&name("A"), PlayerStatus::Clean, Some("No Record"));

        assert_eq!(registry.get(&name("A")).unwrap().note, "friendly");
    }

    #[test]
    fn test_details_kept_when_not_given() {
        let registry = PlayerRegistry::in_memory();
        registry.upsert(&name("A"), PlayerStatus::Bounty, Some("Voice Chat Snake"));
        registry.upsert(&name("A"), PlayerStatus::Bounty, None);

        assert_eq!(registry.get(&name("A")).unwrap().details, "Voice Chat Snake");
    }

    #[test]
    fn test_repeated_upsert_keeps_one_record() {
        let registry = PlayerRegistry::in_memory();
        let first = Utc::now();
        let later = first + Duration::milliseconds(5);
        registry.upsert_at(&name("A"), PlayerStatus::Clean, Some("x"), first);
        registry.upsert_at(&name("A"), PlayerStatus::Clean, Some("x"), later);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&name("A")).unwrap().last_seen_at, later);
    }

    #[test]
    fn test_snapshot_most_recent_first() {
        let registry = PlayerRegistry::in_memory();
        let now = Utc::now();
        registry.upsert_at(&name("Old"), PlayerStatus::Clean, None, now - Duration::seconds(60));
        registry.upsert_at(&name("New"), PlayerStatus::Clean, None, now);
        registry.upsert_at(&name("Mid"), PlayerStatus::Clean, None, now - Duration::seconds(30));

        let order: Vec<String> = registry
            .snapshot()
            .into_iter()
            .map(|r| r.name.to_string())
            .collect();
        assert_eq!(order, vec!["New", "Mid", "Old"]);
    }

    #[test]
    fn test_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daily_history.json");

        let registry = PlayerRegistry::load(&path);
        registry.upsert(&name("Raider99"), PlayerStatus::Bounty, Some("Door Camper"));
        registry.set_note(&name("Raider99"), "avoid");
        drop(registry);

        let reloaded = PlayerRegistry::load(&path);
        let record = reloaded.get(&name("Raider99")).unwrap();
        assert_eq!(record.status, PlayerStatus::Bounty);
        assert_eq!(record.details, "Door Camper");
        assert_eq!(record.note, "avoid");
    }

    #[test]
    fn test_clear_all_persists_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daily_history.json");

        let registry = PlayerRegistry::load(&path);
        registry.upsert(&name("A"), PlayerStatus::Clean, None);
        registry.clear_all();
        assert_eq!(registry.len(), 0);

        assert_eq!(PlayerRegistry::load(&path).len(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "{}");
    }

    #[test]
    fn test_corrupted_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daily_history.json");
        fs::write(&path, "{\"A\": 17").unwrap();

        let registry = PlayerRegistry::load(&path);
        assert_eq!(registry.len(), 0);

        // And the next write replaces the garbage
        registry.upsert(&name("A"), PlayerStatus::Clean, None);
        assert_eq!(PlayerRegistry::load(&path).len(), 1);
    }

    #[test]
    fn test_write_failure_keeps_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("history.json");

        let registry = PlayerRegistry::load(&path);
        registry.upsert(&name("A"), PlayerStatus::Clean, None);
        assert_eq!(registry.get(&name("A")).unwrap().status, PlayerStatus::Clean);
    }

    #[test]
    fn test_concurrent_notes_and_sightings_lose_nothing() {
        let registry = Arc::new(PlayerRegistry::in_memory());
        let target = name("Contested");
        registry.upsert(&target, PlayerStatus::Queued, None);

        let sightings = {
            let registry = Arc::clone(&registry);
            let target = target.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    registry.upsert(&target, PlayerStatus::Clean, Some("No Record"));
                }
            })
        };
        let notes = {
            let registry = Arc::clone(&registry);
            let target = target.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    registry.set_note(&target, &format!("note {}", i));
                }
            })
        };
        sightings.join().unwrap();
        notes.join().unwrap();

        let record = registry.get(&target).unwrap();
        assert_eq!(record.status, PlayerStatus::Clean);
        assert_eq!(record.details, "No Record");
        assert_eq!(record.note, "note 199");
    }
}

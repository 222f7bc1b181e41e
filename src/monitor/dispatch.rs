//! Cooldown policy applied to every extracted name.
//!
//! Decides, per sighting, between a fresh lookup, a re-encounter reminder
//! and doing nothing. The registry only stores; all timing rules live here.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::activity::ActivityLog;
use crate::monitor::config::{MonitorConfig, RegionKind};
use crate::monitor::queue::LookupSender;
use crate::monitor::registry::{PlayerName, PlayerRecord, PlayerRegistry, PlayerStatus};
use crate::monitor::worker::MANUAL_CHECK_DETAILS;
use crate::narrator::Narrator;

pub const DEATH_SCREEN_DETAILS: &str = "Death Screen";

/// Cooldown windows, in whole seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cooldowns {
    pub proximity: Duration,
    pub death: Duration,
    /// Minimum gap between reminders for one name
    pub reminder: Duration,
}

impl Default for Cooldowns {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

impl Cooldowns {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            proximity: seconds(config.proximity_cooldown_secs),
            death: seconds(config.death_cooldown_secs),
            reminder: seconds(config.reminder_interval_secs),
        }
    }
}

fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// What the policy did with a sighting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SightingAction {
    /// Marked Queued and handed to the lookup worker
    Enqueued,
    /// Inside the cooldown; reminder narrated and last-seen refreshed
    Reencounter,
    /// Inside the cooldown and nothing to do
    Suppressed,
}

/// Applies the cooldown policy on behalf of the monitor loop.
pub struct Dispatcher {
    registry: Arc<PlayerRegistry>,
    queue: LookupSender,
    narrator: Arc<dyn Narrator>,
    activity: ActivityLog,
    cooldowns: Cooldowns,
    /// When each name was last reminded this session
    reminded_at: HashMap<PlayerName, DateTime<Utc>>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<PlayerRegistry>,
        queue: LookupSender,
        narrator: Arc<dyn Narrator>,
        activity: ActivityLog,
        cooldowns: Cooldowns,
    ) -> Self {
        Self {
            registry,
            queue,
            narrator,
            activity,
            cooldowns,
            reminded_at: HashMap::new(),
        }
    }

    /// A name read from the proximity list.
    ///
    /// Unknown names and names last seen at least the proximity cooldown ago
    /// get a fresh lookup. Anything newer is a re-encounter.
    pub fn on_proximity_sighting(&mut self, name: &PlayerName, now: DateTime<Utc>) -> SightingAction {
        let existing = self.registry.get(name);
        let expired = existing
            .as_ref()
            .is_none_or(|r| now - r.last_seen_at >= self.cooldowns.proximity);

        if expired {
            self.registry
                .upsert_at(name, PlayerStatus::Queued, None, now);
            return self.enqueue(name, RegionKind::Proximity, now);
        }

        let Some(record) = existing else {
            return SightingAction::Suppressed;
        };
        if let Some(last) = self.reminded_at.get(name) {
            if now - *last < self.cooldowns.reminder {
                return SightingAction::Suppressed;
            }
        }

        self.reminded_at.insert(name.clone(), now);
        self.activity.record(&format!("Re-encounter: {}", name));
        self.narrator.speak(&reminder_message(&record));
        self.registry.touch_at(name, now);
        SightingAction::Reencounter
    }

    /// A killer name read from the death overlay.
    ///
    /// Only names unseen for longer than the death cooldown are looked up;
    /// recent ones are ignored without any narration.
    pub fn on_killer(&mut self, name: &PlayerName, now: DateTime<Utc>) -> SightingAction {
        let expired = self
            .registry
            .get(name)
            .is_none_or(|r| now - r.last_seen_at > self.cooldowns.death);
        if !expired {
            return SightingAction::Suppressed;
        }

        self.registry
            .upsert_at(name, PlayerStatus::Queued, Some(DEATH_SCREEN_DETAILS), now);
        self.activity.record(&format!("KILLED BY: {}", name));
        self.narrator
            .speak(&format!("Killed by {}. Checking record.", name));
        self.enqueue(name, RegionKind::Death, now)
    }

    /// Hands the name to the worker. A fresh lookup also starts the reminder
    /// window, so the next frames do not announce it as a re-encounter.
    fn enqueue(&mut self, name: &PlayerName, context: RegionKind, now: DateTime<Utc>) -> SightingAction {
        match self.queue.enqueue(name.clone(), context) {
            Ok(()) => {
                self.reminded_at.insert(name.clone(), now);
                self.activity.record(&format!("Queued: {}", name));
                SightingAction::Enqueued
            }
            Err(e) => {
                // No worker will ever resolve it, so never leave it Queued
                self.registry
                    .upsert_at(name, PlayerStatus::Bounty, Some(MANUAL_CHECK_DETAILS), now);
                self.activity
                    .record(&format!("Failed to queue {}: {}", name, e));
                SightingAction::Suppressed
            }
        }
    }
}

/// Builds the spoken reminder from what is already known about a player.
pub fn reminder_message(record: &PlayerRecord) -> String {
    let mut msg = format!("Re-encountering {}.", record.name);
    match record.status {
        PlayerStatus::Clean => msg.push_str(" Still listed as Clean."),
        PlayerStatus::Bounty => msg.push_str(&format!(" History says: {}", record.details)),
        _ => {}
    }
    if !record.note.is_empty() {
        msg.push_str(&format!(" Your Note: {}", record.note));
    }
    msg
}

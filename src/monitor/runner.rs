//! Monitor loop - drives capture on two independent cadences.
//!
//! Each region has its own interval timer, so changing one cadence never
//! shifts the other. Every failure inside a scan is logged and the loop moves
//! on to the next tick.

use anyhow::Result;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::activity::ActivityLog;
use crate::capture::CaptureSource;
use crate::monitor::config::{MonitorConfig, RegionKind};
use crate::monitor::dispatch::{Cooldowns, Dispatcher, SightingAction};
use crate::monitor::queue::LookupSender;
use crate::monitor::registry::{PlayerName, PlayerRegistry};
use crate::narrator::Narrator;
use crate::ocr::{
    extract_proximity_names, read_region, DeathScreenParser, DeathScreenVerdict,
    PreprocessSettings, ProximityFilter, TextRecognizer,
};

/// Longest single sleep, so a stop request is noticed promptly.
const MAX_IDLE: Duration = Duration::from_millis(250);

/// Interval timer for one region.
#[derive(Debug, Clone, Copy)]
struct RegionSchedule {
    interval: Duration,
    next_due: Instant,
}

impl RegionSchedule {
    /// First scan is due immediately.
    fn new(interval_ms: u64, now: Instant) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms.max(1)),
            next_due: now,
        }
    }

    fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// Schedules the next scan. Missed ticks are skipped, not replayed.
    fn advance(&mut self, now: Instant) {
        self.next_due += self.interval;
        if self.next_due <= now {
            self.next_due = now + self.interval;
        }
    }
}

/// Collaborators shared between the monitor loop and the service.
#[derive(Clone)]
pub struct MonitorDeps {
    pub capture: Arc<dyn CaptureSource>,
    pub recognizer: Arc<dyn TextRecognizer>,
    pub registry: Arc<PlayerRegistry>,
    pub narrator: Arc<dyn Narrator>,
    pub activity: ActivityLog,
}

pub struct MonitorLoop {
    config: MonitorConfig,
    capture: Arc<dyn CaptureSource>,
    recognizer: Arc<dyn TextRecognizer>,
    preprocess: PreprocessSettings,
    proximity_filter: ProximityFilter,
    death_parser: DeathScreenParser,
    dispatcher: Dispatcher,
}

impl MonitorLoop {
    pub fn new(config: MonitorConfig, deps: MonitorDeps, queue: LookupSender) -> Self {
        let dispatcher = Dispatcher::new(
            deps.registry,
            queue,
            deps.narrator,
            deps.activity,
            Cooldowns::from_config(&config),
        );
        Self {
            preprocess: PreprocessSettings::from_config(&config),
            proximity_filter: ProximityFilter::from_config(&config),
            death_parser: DeathScreenParser::from_config(&config),
            capture: deps.capture,
            recognizer: deps.recognizer,
            dispatcher,
            config,
        }
    }

    /// Captures and reads the proximity list, applying the cooldown policy
    /// to every candidate. Returns the number of lookups queued.
    pub fn scan_proximity(&mut self) -> Result<usize> {
        let img = self
            .capture
            .capture(&self.config.region(RegionKind::Proximity), self.config.monitor_index)?;
        let lines = read_region(
            &img,
            RegionKind::Proximity,
            &self.preprocess,
            self.recognizer.as_ref(),
        )?;

        let now = Utc::now();
        let mut queued = 0;
        for name in extract_proximity_names(&lines, &self.proximity_filter) {
            if self.dispatcher.on_proximity_sighting(&name, now) == SightingAction::Enqueued {
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// Captures and parses the death overlay. Returns the killer when the
    /// frame showed one.
    pub fn scan_death(&mut self) -> Result<Option<PlayerName>> {
        let img = self
            .capture
            .capture(&self.config.region(RegionKind::Death), self.config.monitor_index)?;
        let lines = read_region(
            &img,
            RegionKind::Death,
            &self.preprocess,
            self.recognizer.as_ref(),
        )?;
        if lines.is_empty() {
            return Ok(None);
        }

        let verdict = self.death_parser.parse(&lines);
        if matches!(
            verdict,
            DeathScreenVerdict::StatOverlay(_) | DeathScreenVerdict::Rejected(_)
        ) {
            crate::log(&format!("Death screen: {}", verdict));
        }
        let Some(killer) = verdict.killer() else {
            return Ok(None);
        };
        self.dispatcher.on_killer(&killer, Utc::now());
        Ok(Some(killer))
    }

    /// Runs until `running` is cleared. Blocks, so run it on its own thread.
    pub fn run(mut self, running: &AtomicBool) {
        let start = Instant::now();
        let mut proximity = RegionSchedule::new(self.config.proximity_interval_ms, start);
        let mut death = RegionSchedule::new(self.config.death_interval_ms, start);

        while running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if proximity.is_due(now) {
                proximity.advance(now);
                if let Err(e) = self.scan_proximity() {
                    crate::log(&format!("Proximity scan error: {:#}", e));
                }
            }

            let now = Instant::now();
            if death.is_due(now) {
                death.advance(now);
                if let Err(e) = self.scan_death() {
                    crate::log(&format!("Death screen scan error: {:#}", e));
                }
            }

            let next = proximity.next_due.min(death.next_due);
            let idle = next.saturating_duration_since(Instant::now()).min(MAX_IDLE);
            if !idle.is_zero() {
                thread::sleep(idle);
            }
        }
    }
}

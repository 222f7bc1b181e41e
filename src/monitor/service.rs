//! Monitor service - the single object the control surface talks to.
//!
//! Owns the registry, the lookup queue and its worker, and the monitor loop
//! thread. The worker lives for the whole process; the loop comes and goes
//! with `start`/`stop`.

use anyhow::{bail, Result};
use image::RgbaImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::activity::ActivityLog;
use crate::capture::preview::render_region_preview;
use crate::capture::MonitorInfo;
use crate::lookup::LookupService;
use crate::monitor::config::MonitorConfig;
use crate::monitor::registry::{NoteChange, PlayerName, PlayerRecord, PlayerRegistry};
use crate::monitor::runner::{MonitorDeps, MonitorLoop};
use crate::monitor::worker::{LookupQueue, LookupWorker};

/// A running monitor loop and its private stop flag.
struct ActiveLoop {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct MonitorService {
    config: Mutex<MonitorConfig>,
    deps: MonitorDeps,
    queue: Mutex<LookupQueue>,
    active: Mutex<Option<ActiveLoop>>,
}

impl MonitorService {
    /// Spawns the lookup worker. The monitor loop stays stopped until
    /// `start` is called.
    pub fn new(config: MonitorConfig, deps: MonitorDeps, lookup: Box<dyn LookupService>) -> Self {
        let queue = LookupQueue::spawn(LookupWorker {
            registry: Arc::clone(&deps.registry),
            service: lookup,
            narrator: Arc::clone(&deps.narrator),
            activity: deps.activity.clone(),
        });
        Self {
            config: Mutex::new(config),
            deps,
            queue: Mutex::new(queue),
            active: Mutex::new(None),
        }
    }

    /// Starts the monitor loop. Returns false when it was already running.
    pub fn start(&self) -> bool {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(current) = active.take() {
            if current.running.load(Ordering::SeqCst) {
                *active = Some(current);
                return false;
            }
            // A stopped loop may still be finishing its last scan
            if current.handle.join().is_err() {
                crate::log("Monitor loop thread panicked");
            }
        }

        let config = self.config();
        let sender = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sender();
        let monitor = MonitorLoop::new(config, self.deps.clone(), sender);

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::spawn(move || {
            crate::log("Monitor loop started");
            monitor.run(&flag);
            crate::log("Monitor loop finished");
        });
        *active = Some(ActiveLoop { running, handle });
        drop(active);

        self.deps.activity.record("System Started.");
        self.deps.narrator.speak("Overlay Active.");
        true
    }

    /// Signals the loop to stop after its current scan. Queued lookups keep
    /// draining in the background.
    pub fn stop(&self) {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(current) = active.as_ref() {
            if current.running.swap(false, Ordering::SeqCst) {
                self.deps.activity.record("System Stopped.");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|current| current.running.load(Ordering::SeqCst))
    }

    pub fn pending_lookups(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pending()
    }

    /// Attaches a note to a player, creating a manual entry if needed.
    /// Returns the confirmation shown to the user.
    pub fn add_or_update_note(&self, name: &str, note: &str) -> Result<String> {
        let Some(player) = PlayerName::normalize(name) else {
            bail!("Player name cannot be empty");
        };

        let message = match self.deps.registry.set_note(&player, note) {
            NoteChange::Updated => format!("Saved note for {}.", player),
            NoteChange::Created => format!("Created entry for {}.", player),
        };
        self.deps.activity.record(&message);
        Ok(message)
    }

    /// Every known player, most recently seen first.
    pub fn history_snapshot(&self) -> Vec<PlayerRecord> {
        self.deps.registry.snapshot()
    }

    /// Recent activity messages, newest first.
    pub fn recent_log(&self) -> Vec<String> {
        self.deps.activity.entries()
    }

    pub fn clear_history(&self) {
        self.deps.registry.clear_all();
        self.deps.activity.record("History cleared.");
    }

    pub fn config(&self) -> MonitorConfig {
        self.config
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replaces the configuration. Voice settings apply immediately; a
    /// running loop keeps its snapshot until the next `start`.
    pub fn update_config(&self, config: MonitorConfig) {
        self.deps.narrator.reconfigure(&config);
        *self.config.lock().unwrap_or_else(|e| e.into_inner()) = config;
    }

    /// Attached monitors, for the settings picker.
    pub fn monitors(&self) -> Vec<MonitorInfo> {
        self.deps.capture.monitors()
    }

    /// Captures the whole monitor named by `config` and outlines its two
    /// regions. Takes the config explicitly so unsaved edits can be checked.
    pub fn preview_regions(&self, config: &MonitorConfig) -> Result<RgbaImage> {
        let frame = self.deps.capture.capture_monitor(config.monitor_index)?;
        Ok(render_region_preview(&frame, config))
    }

    /// Stops the loop, waits for it, then drains and stops the lookup worker.
    pub fn shutdown(&self) {
        let current = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(current) = current {
            current.running.store(false, Ordering::SeqCst);
            if current.handle.join().is_err() {
                crate::log("Monitor loop thread panicked");
            }
        }

        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .shutdown();
    }
}

impl Drop for MonitorService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

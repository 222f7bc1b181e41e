//! User-facing activity console.
//!
//! A fixed-capacity ring of recent messages, newest first. Shared by the
//! monitor loop, the lookup worker and the GUI; every entry is also written
//! through `crate::log` so the log file keeps the full history.

use chrono::Local;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Number of entries kept for display.
pub const ACTIVITY_CAPACITY: usize = 50;

/// Cheaply cloneable handle to the shared activity ring.
#[derive(Clone, Debug)]
pub struct ActivityLog {
    entries: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(ACTIVITY_CAPACITY)
    }
}

impl ActivityLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    /// Records a message, evicting the oldest entry once full.
    pub fn record(&self, msg: &str) {
        let entry = format!("[{}] {}", Local::now().format("%H:%M:%S"), msg);
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.push_front(entry);
            entries.truncate(self.capacity);
        }
        crate::log(msg);
    }

    /// Returns the entries, newest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

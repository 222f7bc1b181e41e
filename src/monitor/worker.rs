//! Lookup worker thread.
//!
//! Runs in a dedicated thread for the life of the process, taking one
//! pending lookup at a time from the queue. Lookup failures never escape:
//! they degrade the player to "Manual Check Required".

use anyhow::{anyhow, Result};
use chrono::Utc;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::activity::ActivityLog;
use crate::lookup::{LookupOutcome, LookupService};
use crate::monitor::queue::{create_lookup_queue, LookupMessage, LookupReceiver, LookupSender, PendingLookup};
use crate::monitor::registry::{PlayerName, PlayerRegistry, PlayerStatus};
use crate::narrator::Narrator;

pub const MANUAL_CHECK_DETAILS: &str = "Manual Check Required";

/// Everything the worker needs to resolve a lookup.
pub struct LookupWorker {
    pub registry: Arc<PlayerRegistry>,
    pub service: Box<dyn LookupService>,
    pub narrator: Arc<dyn Narrator>,
    pub activity: ActivityLog,
}

impl LookupWorker {
    /// Resolves one lookup and records the result.
    pub fn process(&self, item: &PendingLookup) {
        let name = &item.name;
        let waited = (Utc::now() - item.enqueued_at).num_seconds();
        if waited > 0 {
            crate::log(&format!("{} waited {}s in the lookup queue", name, waited));
        }
        self.activity
            .record(&format!("Searching: {} ({})...", name, item.context));

        match self.lookup_guarded(name) {
            Ok(LookupOutcome::Clean { details }) => {
                self.registry
                    .upsert(name, PlayerStatus::Clean, Some(&details));
                self.activity
                    .record(&format!("Result: {} is Clean.", name));
                self.narrator
                    .speak(&format!("Raider {} is not listed.", name));
            }
            Ok(LookupOutcome::Bounty { details }) => {
                self.registry
                    .upsert(name, PlayerStatus::Bounty, Some(&details));
                self.activity
                    .record(&format!("Result: {} has a bounty: {}", name, details));
                self.narrator.speak(&details);
            }
            Err(e) => {
                self.registry
                    .upsert(name, PlayerStatus::Bounty, Some(MANUAL_CHECK_DETAILS));
                self.activity
                    .record(&format!("Lookup failed for {}: {:#}", name, e));
                self.narrator.speak(&format!(
                    "Warning. Could not verify {}. Manual check required.",
                    name
                ));
            }
        }
    }

    /// A panicking lookup counts as a failed one so the worker survives it.
    fn lookup_guarded(&self, name: &PlayerName) -> Result<LookupOutcome> {
        panic::catch_unwind(AssertUnwindSafe(|| self.service.lookup(name)))
            .unwrap_or_else(|_| Err(anyhow!("lookup panicked")))
    }

    /// Processes items until a shutdown message arrives or every sender is
    /// dropped. Blocks, so run it on a dedicated thread.
    pub fn run(self, receiver: LookupReceiver) {
        crate::log("Lookup worker started");

        loop {
            match receiver.recv() {
                Ok(LookupMessage::Lookup(item)) => {
                    self.process(&item);
                    receiver.complete_one();
                }
                Ok(LookupMessage::Shutdown) => {
                    crate::log("Lookup worker: shutdown requested, exiting");
                    break;
                }
                Err(_) => {
                    crate::log("Lookup worker: channel closed, exiting");
                    break;
                }
            }
        }

        crate::log("Lookup worker finished");
    }
}

/// Handle to the one lookup worker and its queue.
pub struct LookupQueue {
    sender: LookupSender,
    handle: Option<JoinHandle<()>>,
}

impl LookupQueue {
    /// Creates the queue and spawns its only consumer.
    pub fn spawn(worker: LookupWorker) -> Self {
        let (sender, receiver) = create_lookup_queue();
        let handle = thread::spawn(move || worker.run(receiver));
        Self {
            sender,
            handle: Some(handle),
        }
    }

    pub fn sender(&self) -> LookupSender {
        self.sender.clone()
    }

    pub fn pending(&self) -> usize {
        self.sender.pending()
    }

    /// Lets the worker drain what is queued, then waits for it to exit.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(e) = self.sender.send_shutdown() {
            crate::log(&format!("Lookup worker already stopped: {}", e));
        }
        if handle.join().is_err() {
            crate::log("Lookup worker thread panicked");
        }
    }
}

impl Drop for LookupQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
pub mod testing {
    use anyhow::{anyhow, Result};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::lookup::{LookupOutcome, LookupService};
    use crate::monitor::registry::PlayerName;

    /// Scripted lookup service that tracks concurrency and call order.
    #[derive(Default)]
    pub struct ScriptedLookup {
        pub outcomes: HashMap<String, LookupOutcome>,
        pub delay: Duration,
        pub active: AtomicUsize,
        pub max_active: AtomicUsize,
        pub calls: Mutex<Vec<String>>,
        /// Name whose lookup panics instead of returning
        pub panics_on: Option<String>,
    }

    impl ScriptedLookup {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl LookupService for std::sync::Arc<ScriptedLookup> {
        fn lookup(&self, name: &PlayerName) -> Result<LookupOutcome> {
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.calls.lock().unwrap().push(name.to_string());
            self.active.fetch_sub(1, Ordering::SeqCst);
            if self.panics_on.as_deref() == Some(name.as_str()) {
                panic!("scraper blew up on {}", name);
            }

            self.outcomes
                .get(name.as_str())
                .cloned()
                .ok_or_else(|| anyhow!("bounty board unreachable"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedLookup;
    use super::*;
    use crate::monitor::config::RegionKind;
    use crate::narrator::testing::RecordingNarrator;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn name(s: &str) -> PlayerName {
        PlayerName::new(s).unwrap()
    }

    fn worker(
        lookup: &Arc<ScriptedLookup>,
    ) -> (LookupWorker, Arc<PlayerRegistry>, Arc<RecordingNarrator>) {
        let registry = Arc::new(PlayerRegistry::in_memory());
        let narrator = Arc::new(RecordingNarrator::default());
        let worker = LookupWorker {
            registry: Arc::clone(&registry),
            service: Box::new(Arc::clone(lookup)),
            narrator: narrator.clone(),
            activity: ActivityLog::default(),
        };
        (worker, registry, narrator)
    }

    fn scripted(outcomes: &[(&str, LookupOutcome)]) -> Arc<ScriptedLookup> {
        Arc::new(ScriptedLookup {
            outcomes: outcomes
                .iter()
                .map(|(n, o)| (n.to_string(), o.clone()))
                .collect(),
            ..ScriptedLookup::default()
        })
    }

    #[test]
    fn test_clean_outcome() {
        let lookup = scripted(&[(
            "Raider99",
            LookupOutcome::Clean {
                details: "No Record".to_string(),
            },
        )]);
        let (worker, registry, narrator) = worker(&lookup);
        registry.upsert(&name("Raider99"), PlayerStatus::Queued, None);

        worker.process(&PendingLookup::new(name("Raider99"), RegionKind::Proximity));

        let record = registry.get(&name("Raider99")).unwrap();
        assert_eq!(record.status, PlayerStatus::Clean);
        assert_eq!(record.details, "No Record");
        assert_eq!(narrator.spoken(), vec!["Raider Raider99 is not listed."]);
    }

    #[test]
    fn test_bounty_outcome_narrates_details() {
        let details = "Raider99 is listed for extraction camping.";
        let lookup = scripted(&[(
            "Raider99",
            LookupOutcome::Bounty {
                details: details.to_string(),
            },
        )]);
        let (worker, registry, narrator) = worker(&lookup);

        worker.process(&PendingLookup::new(name("Raider99"), RegionKind::Death));

        let record = registry.get(&name("Raider99")).unwrap();
        assert_eq!(record.status, PlayerStatus::Bounty);
        assert_eq!(record.details, details);
        assert_eq!(narrator.spoken(), vec![details]);
    }

    #[test]
    fn test_failure_degrades_to_manual_check() {
        let lookup = scripted(&[]);
        let (worker, registry, narrator) = worker(&lookup);
        registry.set_note(&name("Flaky"), "watch out");

        worker.process(&PendingLookup::new(name("Flaky"), RegionKind::Proximity));

        let record = registry.get(&name("Flaky")).unwrap();
        assert_eq!(record.status, PlayerStatus::Bounty);
        assert_eq!(record.details, MANUAL_CHECK_DETAILS);
        assert_eq!(record.note, "watch out");
        assert_eq!(narrator.spoken().len(), 1);
        assert!(narrator.spoken()[0].starts_with("Warning."));
    }

    #[test]
    fn test_panicking_lookup_keeps_worker_alive() {
        let lookup = Arc::new(ScriptedLookup {
            outcomes: [(
                "Alpha".to_string(),
                LookupOutcome::Clean {
                    details: "No Record".to_string(),
                },
            )]
            .into_iter()
            .collect(),
            panics_on: Some("Boom".to_string()),
            ..ScriptedLookup::default()
        });
        let (worker, registry, narrator) = worker(&lookup);
        let mut queue = LookupQueue::spawn(worker);

        let sender = queue.sender();
        sender.enqueue(name("Boom"), RegionKind::Proximity).unwrap();
        sender.enqueue(name("Alpha"), RegionKind::Proximity).unwrap();
        queue.shutdown();

        assert_eq!(lookup.calls(), vec!["Boom", "Alpha"]);
        let boom = registry.get(&name("Boom")).unwrap();
        assert_eq!(boom.status, PlayerStatus::Bounty);
        assert_eq!(boom.details, MANUAL_CHECK_DETAILS);
        assert_eq!(registry.get(&name("Alpha")).unwrap().status, PlayerStatus::Clean);
        assert_eq!(narrator.spoken().len(), 2);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_single_flight_in_enqueue_order() {
        let lookup = Arc::new(ScriptedLookup {
            delay: Duration::from_millis(5),
            ..ScriptedLookup::default()
        });
        let (worker, _registry, _narrator) = worker(&lookup);
        let mut queue = LookupQueue::spawn(worker);
        let sender = queue.sender();

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let sender = sender.clone();
                thread::spawn(move || {
                    for i in 0..5 {
                        sender
                            .enqueue(name(&format!("p{}_{}", p, i)), RegionKind::Proximity)
                            .unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        queue.shutdown();

        assert_eq!(lookup.max_active.load(Ordering::SeqCst), 1);
        let calls = lookup.calls();
        assert_eq!(calls.len(), 20);
        // Each producer's lookups complete in the order it queued them
        for p in 0..4 {
            let prefix = format!("p{}_", p);
            let mine: Vec<&String> = calls.iter().filter(|c| c.starts_with(&prefix)).collect();
            let expected: Vec<String> = (0..5).map(|i| format!("p{}_{}", p, i)).collect();
            assert_eq!(mine, expected.iter().collect::<Vec<_>>());
        }
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_shutdown_drains_queue_first() {
        let lookup = Arc::new(ScriptedLookup {
            delay: Duration::from_millis(2),
            ..ScriptedLookup::default()
        });
        let (worker, registry, _narrator) = worker(&lookup);
        let mut queue = LookupQueue::spawn(worker);

        let sender = queue.sender();
        for n in ["Alpha", "Bravo", "Charlie"] {
            sender.enqueue(name(n), RegionKind::Death).unwrap();
        }
        queue.shutdown();

        assert_eq!(lookup.calls(), vec!["Alpha", "Bravo", "Charlie"]);
        assert_eq!(registry.len(), 3);
        assert!(sender.enqueue(name("Late"), RegionKind::Death).is_err());
    }
}

//! Lookup queue between the monitor loop and the lookup worker.
//!
//! Uses an unbounded std::sync::mpsc channel with exactly one receiver. The
//! single receiver is what serializes lookups: whoever holds it is the only
//! thread that ever calls the lookup service.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvError, Sender};
use std::sync::Arc;

use crate::monitor::config::RegionKind;
use crate::monitor::registry::PlayerName;

/// A lookup waiting for the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLookup {
    pub name: PlayerName,
    /// Which region produced the sighting
    pub context: RegionKind,
    pub enqueued_at: DateTime<Utc>,
}

impl PendingLookup {
    pub fn new(name: PlayerName, context: RegionKind) -> Self {
        Self {
            name,
            context,
            enqueued_at: Utc::now(),
        }
    }
}

/// Items travelling through the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupMessage {
    Lookup(PendingLookup),
    /// Tells the worker to exit once everything before it is drained
    Shutdown,
}

/// Producer side. Cheap to clone; every clone feeds the same worker.
#[derive(Clone, Debug)]
pub struct LookupSender {
    sender: Sender<LookupMessage>,
    pending: Arc<AtomicUsize>,
}

impl LookupSender {
    pub fn enqueue(&self, name: PlayerName, context: RegionKind) -> Result<()> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self
            .sender
            .send(LookupMessage::Lookup(PendingLookup::new(name, context)))
        {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(anyhow!("Lookup worker is gone: {}", e));
        }
        Ok(())
    }

    /// Lookups queued or in flight.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub(crate) fn send_shutdown(&self) -> Result<()> {
        self.sender
            .send(LookupMessage::Shutdown)
            .map_err(|e| anyhow!("Lookup worker is gone: {}", e))
    }
}

/// Consumer side. Not cloneable, so there is only ever one.
#[derive(Debug)]
pub struct LookupReceiver {
    receiver: Receiver<LookupMessage>,
    pending: Arc<AtomicUsize>,
}

impl LookupReceiver {
    /// Blocks until the next message. Errors once every sender is dropped.
    pub fn recv(&self) -> Result<LookupMessage, RecvError> {
        self.receiver.recv()
    }

    /// Marks one lookup as fully processed.
    pub(crate) fn complete_one(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

/// Creates the lookup queue.
///
/// The channel is unbounded - lookups pile up while the worker is busy.
pub fn create_lookup_queue() -> (LookupSender, LookupReceiver) {
    let (sender, receiver) = channel();
    let pending = Arc::new(AtomicUsize::new(0));
    (
        LookupSender {
            sender,
            pending: Arc::clone(&pending),
        },
        LookupReceiver { receiver, pending },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> PlayerName {
        PlayerName::new(s).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let (sender, receiver) = create_lookup_queue();
        for i in 1..=5 {
            sender
                .enqueue(name(&format!("player{}", i)), RegionKind::Proximity)
                .unwrap();
        }
        assert_eq!(sender.pending(), 5);

        for i in 1..=5 {
            match receiver.recv().unwrap() {
                LookupMessage::Lookup(item) => {
                    assert_eq!(item.name.as_str(), format!("player{}", i));
                    assert_eq!(item.context, RegionKind::Proximity);
                }
                LookupMessage::Shutdown => panic!("unexpected shutdown"),
            }
            receiver.complete_one();
        }
        assert_eq!(sender.pending(), 0);
    }

    #[test]
    fn test_shutdown_comes_after_queued_items() {
        let (sender, receiver) = create_lookup_queue();
        sender.enqueue(name("Killer1"), RegionKind::Death).unwrap();
        sender.send_shutdown().unwrap();

        assert!(matches!(receiver.recv().unwrap(), LookupMessage::Lookup(_)));
        assert_eq!(receiver.recv().unwrap(), LookupMessage::Shutdown);
    }

    #[test]
    fn test_enqueue_fails_when_receiver_dropped() {
        let (sender, receiver) = create_lookup_queue();
        drop(receiver);

        assert!(sender.enqueue(name("Nobody"), RegionKind::Proximity).is_err());
        assert_eq!(sender.pending(), 0);
    }

    #[test]
    fn test_channel_closes_when_senders_dropped() {
        let (sender, receiver) = create_lookup_queue();
        let clone = sender.clone();
        drop(sender);
        drop(clone);

        assert!(receiver.recv().is_err());
    }
}

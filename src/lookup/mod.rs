//! Reputation lookups against the community bounty board.
//!
//! The worker only sees the `LookupService` trait; `BountyBoardLookup` is the
//! production implementation.

pub mod bounty_board;
pub mod summary;

pub use bounty_board::BountyBoardLookup;

use anyhow::Result;

use crate::monitor::registry::PlayerName;

/// Result of a successful lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupOutcome {
    Clean { details: String },
    Bounty { details: String },
}

/// A blocking reputation lookup.
///
/// Calls take seconds. Implementations must bound their own latency: the
/// queue runs one lookup at a time, so a call that never returns stalls
/// every lookup behind it.
pub trait LookupService: Send {
    fn lookup(&self, name: &PlayerName) -> Result<LookupOutcome>;
}

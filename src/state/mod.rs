//! Persistent State Module
//!
//! Current term and the vote cast in it.
//!
//! ## Responsibilities
//! - Atomic term reads for any number of readers
//! - At most one vote per term: a term change clears the vote in the same
//!   critical section
//! - "No vote yet" and "voted for this candidate" both accept a vote
//!   request, so candidates can retry safely
//!
//! Mutators are crate-private. They are only called by
//! [`ReplicatedLog`](crate::log::ReplicatedLog) while it holds its
//! exclusive guard.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::entry::Term;

/// Identity of a cluster member that can receive a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member-{}", self.0)
    }
}

impl From<u64> for MemberId {
    fn from(id: u64) -> Self {
        MemberId(id)
    }
}

/// Term counter and vote record
///
/// ## Concurrency:
/// - `term`: atomic, read without locking
/// - `voted_for`: RwLock, also taken for writing whenever the term changes
///   so a reader never sees a new term paired with the old term's vote
pub struct PersistentState {
    term: AtomicU64,
    voted_for: RwLock<Option<MemberId>>,
}

impl PersistentState {
    pub fn new() -> Self {
        Self::restore(0, None)
    }

    /// Rebuild state recovered from durable storage
    pub(crate) fn restore(term: Term, voted_for: Option<MemberId>) -> Self {
        Self {
            term: AtomicU64::new(term),
            voted_for: RwLock::new(voted_for),
        }
    }

    pub fn term(&self) -> Term {
        self.term.load(Ordering::Acquire)
    }

    pub fn voted_for(&self) -> Option<MemberId> {
        *self.voted_for.read()
    }

    /// True when no vote is recorded or the recorded vote is `candidate`
    pub fn is_voted_for(&self, candidate: MemberId) -> bool {
        match *self.voted_for.read() {
            None => true,
            Some(vote) => vote == candidate,
        }
    }

    /// Store `term`; the vote is cleared when the value changes.
    ///
    /// Returns whether the term changed.
    pub(crate) fn set_term(&self, term: Term) -> bool {
        let mut vote = self.voted_for.write();
        let previous = self.term.swap(term, Ordering::AcqRel);
        if previous != term {
            *vote = None;
            true
        } else {
            false
        }
    }

    /// Advance to the next term with no vote cast
    pub(crate) fn increment_term(&self) -> Term {
        let mut vote = self.voted_for.write();
        *vote = None;
        self.term.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn set_voted_for(&self, candidate: MemberId) {
        *self.voted_for.write() = Some(candidate);
    }
}

impl Default for PersistentState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PersistentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentState")
            .field("term", &self.term())
            .field("voted_for", &self.voted_for())
            .finish()
    }
}

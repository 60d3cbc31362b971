//! Durability Module
//!
//! Hooks the log calls before making a change visible.
//!
//! ## Contract
//! - `persist_term` runs before a term or vote change is published, so a
//!   vote is never granted before it is recorded
//! - `persist_append` runs before appended entries are published
//! - `persist_commit` runs before the commit index advances
//!
//! Every hook runs inside the log's exclusive section. When a hook fails the
//! in-memory state is left untouched and the error goes back to the caller.
//! Hooks of a backend reporting [`Durability::is_blocking`] are moved off
//! the async workers onto the blocking pool.

use std::fmt::Debug;

use crate::entry::{LogEntry, LogIndex, Term};
use crate::error::Result;
use crate::state::MemberId;

/// Persistence backend for term, vote, entries and commit index
pub trait Durability: Debug + Send + Sync {
    /// Record the current term together with the vote cast in it
    fn persist_term(&self, term: Term, voted_for: Option<MemberId>) -> Result<()>;

    /// Record `entries` as occupying the log from `start_index` onwards,
    /// replacing anything previously stored there
    fn persist_append(&self, start_index: LogIndex, entries: &[LogEntry]) -> Result<()>;

    /// Record the commit index
    fn persist_commit(&self, commit_index: LogIndex) -> Result<()>;

    /// Flush anything buffered
    fn sync(&self) -> Result<()> {
        Ok(())
    }

    /// Whether hooks may block on I/O
    fn is_blocking(&self) -> bool {
        true
    }
}

/// Keeps nothing; state is lost when the process exits.
///
/// Only suitable for tests and simulations.
#[derive(Debug, Default, Clone, Copy)]
pub struct Volatile;

impl Durability for Volatile {
    fn persist_term(&self, _term: Term, _voted_for: Option<MemberId>) -> Result<()> {
        Ok(())
    }

    fn persist_append(&self, _start_index: LogIndex, _entries: &[LogEntry]) -> Result<()> {
        Ok(())
    }

    fn persist_commit(&self, _commit_index: LogIndex) -> Result<()> {
        Ok(())
    }

    fn is_blocking(&self) -> bool {
        false
    }
}

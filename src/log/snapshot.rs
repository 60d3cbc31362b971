//! Copy-on-write entry storage
//!
//! A `LogSnapshot` is an immutable, shared sequence of entries. Writers
//! never touch a published snapshot; they build the next one from the
//! retained prefix plus new entries and swap the pointer.

use std::fmt;
use std::ops::{Deref, Range};
use std::sync::Arc;

use crate::entry::{LogEntry, LogIndex};
use crate::error::{LogError, Result};

/// Point-in-time view of the whole log (index 0 = sentinel)
#[derive(Clone)]
pub(crate) struct LogSnapshot {
    entries: Arc<[LogEntry]>,
}

impl LogSnapshot {
    /// A log holding only the sentinel
    #[cfg(test)]
    pub(crate) fn new() -> Self {
        Self {
            entries: Arc::from(vec![LogEntry::sentinel()]),
        }
    }

    /// Build from recovered entries, which must not include the sentinel
    pub(crate) fn from_entries(entries: Vec<LogEntry>) -> Self {
        Self {
            entries: std::iter::once(LogEntry::sentinel()).chain(entries).collect(),
        }
    }

    /// Number of slots, sentinel included
    pub(crate) fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    pub(crate) fn last_index(&self) -> LogIndex {
        self.len().saturating_sub(1)
    }

    pub(crate) fn get(&self, index: LogIndex) -> Option<&LogEntry> {
        self.entries.get(usize::try_from(index).ok()?)
    }

    /// Entries in `[start, end]`. `end` must exist; `end < start` is empty.
    pub(crate) fn slice(&self, start: LogIndex, end: LogIndex) -> Result<EntrySlice> {
        if end >= self.len() {
            return Err(LogError::IndexOutOfRange {
                index: end,
                length: self.len(),
            });
        }
        let range = if end < start {
            0..0
        } else {
            start as usize..end as usize + 1
        };
        Ok(EntrySlice {
            entries: Arc::clone(&self.entries),
            range,
        })
    }

    /// New snapshot keeping `[0, cut)` followed by `entries`
    pub(crate) fn splice(&self, cut: LogIndex, entries: Vec<LogEntry>) -> Self {
        let cut = (cut as usize).min(self.entries.len());
        Self {
            entries: self.entries[..cut].iter().cloned().chain(entries).collect(),
        }
    }
}

impl fmt::Debug for LogSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSnapshot")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Immutable range of entries returned by reads.
///
/// Holds its own reference to the snapshot it was taken from, so later
/// appends or truncations never change what it yields.
#[derive(Clone)]
pub struct EntrySlice {
    entries: Arc<[LogEntry]>,
    range: Range<usize>,
}

impl Deref for EntrySlice {
    type Target = [LogEntry];

    fn deref(&self) -> &[LogEntry] {
        &self.entries[self.range.clone()]
    }
}

impl<'a> IntoIterator for &'a EntrySlice {
    type Item = &'a LogEntry;
    type IntoIter = std::slice::Iter<'a, LogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for EntrySlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl PartialEq<[LogEntry]> for EntrySlice {
    fn eq(&self, other: &[LogEntry]) -> bool {
        **self == *other
    }
}

impl PartialEq<Vec<LogEntry>> for EntrySlice {
    fn eq(&self, other: &Vec<LogEntry>) -> bool {
        **self == other[..]
    }
}

//! WAL-backed durability
//!
//! Records every term, vote, append and commit as a WAL operation, and
//! rebuilds node state from those operations on restart.

use std::path::Path;

use parking_lot::Mutex;

use crate::config::WalSyncStrategy;
use crate::durability::Durability;
use crate::entry::{LogEntry, LogIndex, Term};
use crate::error::{LogError, Result};
use crate::state::MemberId;
use super::entry::{APPEND_OVERHEAD, ENTRY_OVERHEAD, MAX_RECORD_SIZE};
use super::{EntryRecord, Operation, WalEntry, WalRecovery, WalWriter};

/// [`Durability`] implementation writing to a WAL file
///
/// An append batch too large for one record is split over several `Append`
/// records written as one unit.
#[derive(Debug)]
pub struct WalStore {
    /// Exclusive access needed for appends
    writer: Mutex<WalWriter>,

    /// Entry bytes (payload plus per-entry overhead) allowed in one record
    record_budget: usize,
}

/// Node state rebuilt from WAL records
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveredState {
    pub term: Term,
    pub voted_for: Option<MemberId>,

    /// Entries from index 1 onwards (the sentinel is not stored)
    pub entries: Vec<LogEntry>,

    pub commit_index: LogIndex,
}

impl WalStore {
    pub fn new(writer: WalWriter) -> Self {
        Self {
            writer: Mutex::new(writer),
            record_budget: MAX_RECORD_SIZE - APPEND_OVERHEAD,
        }
    }

    /// Open or create the WAL at `path`
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        Ok(Self::new(WalWriter::open(path, sync_strategy)?))
    }

    /// LSN the next record will get
    pub fn current_lsn(&self) -> u64 {
        self.writer.lock().current_lsn()
    }

    /// Rebuild node state from the WAL at `path` without modifying it
    ///
    /// A torn or corrupt tail is skipped, exactly as on open, but left on
    /// disk.
    pub fn read_state(path: &Path) -> Result<RecoveredState> {
        let (records, result) = WalRecovery::read(path)?;
        if result.was_truncated {
            tracing::warn!(
                "WAL {}: ignoring {} byte(s) after offset {}",
                path.display(),
                fs_len(path)?.saturating_sub(result.valid_bytes),
                result.valid_bytes
            );
        }
        Self::replay(records)
    }

    /// Apply recovered records in order
    pub fn replay(records: Vec<WalEntry>) -> Result<RecoveredState> {
        let mut state = RecoveredState::default();

        for record in records {
            match record.operation {
                Operation::Term { term, voted_for } => {
                    state.term = term;
                    state.voted_for = voted_for;
                }
                Operation::Append {
                    start_index,
                    entries,
                } => {
                    let len = state.entries.len() as u64 + 1;
                    if start_index == 0 || start_index > len {
                        return Err(LogError::WalCorruption(format!(
                            "LSN {}: append at index {} on a log of length {}",
                            record.lsn, start_index, len
                        )));
                    }
                    state.entries.truncate(start_index as usize - 1);
                    for entry in entries {
                        state.entries.push(entry.into_entry()?);
                    }
                }
                Operation::Commit { index } => {
                    state.commit_index = index;
                }
            }
        }

        let last_index = state.entries.len() as u64;
        if state.commit_index > last_index {
            tracing::warn!(
                "Recovered commit index {} is past the last entry {}; clamping",
                state.commit_index,
                last_index
            );
            state.commit_index = last_index;
        }
        Ok(state)
    }
}

impl Durability for WalStore {
    fn persist_term(&self, term: Term, voted_for: Option<MemberId>) -> Result<()> {
        self.writer
            .lock()
            .append(Operation::Term { term, voted_for })
            .map(|_| ())
    }

    fn persist_append(&self, start_index: LogIndex, entries: &[LogEntry]) -> Result<()> {
        let operations = split_append(start_index, entries, self.record_budget);
        self.writer.lock().append_all(operations).map(|_| ())
    }

    fn persist_commit(&self, commit_index: LogIndex) -> Result<()> {
        self.writer
            .lock()
            .append(Operation::Commit {
                index: commit_index,
            })
            .map(|_| ())
    }

    fn sync(&self) -> Result<()> {
        self.writer.lock().sync()
    }
}

/// `Append` records covering `entries`, each within `budget` entry bytes
fn split_append(start_index: LogIndex, entries: &[LogEntry], budget: usize) -> Vec<Operation> {
    let mut operations = Vec::new();
    let mut batch = Vec::new();
    let mut batch_start = start_index;
    let mut size = 0;

    for entry in entries {
        let entry_size = ENTRY_OVERHEAD + entry.len();
        if !batch.is_empty() && size + entry_size > budget {
            let count = batch.len() as u64;
            operations.push(Operation::Append {
                start_index: batch_start,
                entries: std::mem::take(&mut batch),
            });
            batch_start += count;
            size = 0;
        }
        size += entry_size;
        batch.push(EntryRecord::from(entry));
    }

    if !batch.is_empty() || operations.is_empty() {
        operations.push(Operation::Append {
            start_index: batch_start,
            entries: batch,
        });
    }
    operations
}

fn fs_len(path: &Path) -> Result<u64> {
    Ok(std::fs::metadata(path)?.len())
}

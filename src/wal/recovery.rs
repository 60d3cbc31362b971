//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::error::{LogError, Result};
use super::{WalEntry, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries found (reading stops at the first one)
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether bytes past the valid prefix were (or would be) removed
    pub was_truncated: bool,

    /// Length of the valid prefix in bytes
    pub valid_bytes: u64,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read records in order while they are complete and valid
    /// 2. Stop at the first corrupt or out-of-sequence record; later records
    ///    may depend on it, so none of them are trusted
    /// 3. Truncate the file after the last valid record
    /// 4. Return the valid records in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, result) = Self::read(path)?;

        if result.was_truncated {
            tracing::warn!(
                "WAL {}: dropping bytes after offset {} ({} corrupted record(s))",
                path.display(),
                result.valid_bytes,
                result.entries_corrupted
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(result.valid_bytes)?;
            file.sync_all()?;
        }

        tracing::info!(
            "WAL {}: recovered {} record(s), last_lsn={}",
            path.display(),
            result.entries_recovered,
            result.last_lsn
        );
        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Self::read(path).map(|(_, result)| result)
    }

    /// Collect the valid records without modifying the file
    pub fn read(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let file_len = fs::metadata(path)?.len();
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => {
                    if entry.lsn != result.last_lsn + 1 {
                        tracing::warn!(
                            "WAL {}: expected LSN {}, found {}",
                            path.display(),
                            result.last_lsn + 1,
                            entry.lsn
                        );
                        // valid_bytes still ends before this record
                        result.entries_corrupted += 1;
                        break;
                    }
                    result.last_lsn = entry.lsn;
                    result.entries_recovered += 1;
                    result.valid_bytes = reader.position();
                    entries.push(entry);
                }
                Ok(None) => break,
                Err(LogError::WalCorruption(reason)) => {
                    tracing::warn!("WAL {}: {}", path.display(), reason);
                    result.entries_corrupted += 1;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        result.was_truncated = result.valid_bytes < file_len;
        Ok((entries, result))
    }
}

//! WAL Writer
//!
//! Handles appending entries to the WAL file.
//!
//! ## Failure Handling
//! Every append remembers the file length before it starts. If writing,
//! flushing or syncing fails, buffered bytes are discarded and the file is
//! cut back to that length, so a rejected record never reaches a later
//! recovery. If the cut itself fails the writer is poisoned and refuses all
//! further work.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{LogError, Result};
use super::{Operation, RecoveryResult, WalEntry, WalRecovery};

/// Storage the writer appends frames to
pub trait WalFile: Write + Seek + Send {
    fn set_len(&self, size: u64) -> io::Result<()>;

    fn sync_data(&self) -> io::Result<()>;
}

impl WalFile for File {
    fn set_len(&self, size: u64) -> io::Result<()> {
        File::set_len(self, size)
    }

    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }
}

/// Writes entries to the WAL file
#[derive(Debug)]
pub struct WalWriter<F: WalFile = File> {
    /// `None` once a failed write could not be rolled back
    file: Option<BufWriter<F>>,
    path: PathBuf,

    /// Length of the file up to the last complete record
    offset: u64,

    /// LSN the next record will get
    next_lsn: u64,

    sync_strategy: WalSyncStrategy,

    /// Records written since the last fsync
    uncommitted: usize,
}

impl WalWriter<File> {
    /// Open or create a WAL file
    ///
    /// An existing file is scanned first: LSNs continue after the last valid
    /// record and anything after it is cut off.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let scan = if path.exists() {
            WalRecovery::verify(path)?
        } else {
            RecoveryResult::default()
        };

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        if file.metadata()?.len() > scan.valid_bytes {
            tracing::warn!(
                "WAL {}: truncating invalid tail at offset {}",
                path.display(),
                scan.valid_bytes
            );
            file.set_len(scan.valid_bytes)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(scan.valid_bytes))?;

        Ok(Self::from_parts(
            file,
            path.to_path_buf(),
            scan.valid_bytes,
            scan.last_lsn + 1,
            sync_strategy,
        ))
    }
}

impl<F: WalFile> WalWriter<F> {
    /// Wrap `file`, already positioned at `offset`
    pub(crate) fn from_parts(
        file: F,
        path: PathBuf,
        offset: u64,
        next_lsn: u64,
        sync_strategy: WalSyncStrategy,
    ) -> Self {
        Self {
            file: Some(BufWriter::new(file)),
            path,
            offset,
            next_lsn,
            sync_strategy,
            uncommitted: 0,
        }
    }

    /// Append an entry to the WAL, returning its LSN
    ///
    /// The record is handed to the OS before returning; fsync follows the
    /// configured strategy. On failure nothing of the record remains.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        self.append_all(vec![operation])
    }

    /// Append several records as one unit, returning the last LSN
    ///
    /// Either every record is written or, after a failure, none of them.
    pub fn append_all(&mut self, operations: Vec<Operation>) -> Result<u64> {
        let first_lsn = self.next_lsn;
        let count = operations.len();
        if count == 0 {
            return Ok(first_lsn - 1);
        }
        let last_lsn = first_lsn + count as u64 - 1;

        let start = self.offset;
        match self.write_records(first_lsn, operations) {
            Ok(bytes) => {
                self.offset = start + bytes;
                self.next_lsn = last_lsn + 1;
                Ok(last_lsn)
            }
            Err(e) => {
                self.rollback(start);
                Err(e)
            }
        }
    }

    /// Write, flush and (if due) sync; returns the bytes written
    fn write_records(&mut self, first_lsn: u64, operations: Vec<Operation>) -> Result<u64> {
        let uncommitted = self.uncommitted + operations.len();
        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => uncommitted >= count,
        };

        let path = self.path.display().to_string();
        let failed =
            |lsn: u64, e: io::Error| LogError::WalWrite(format!("{}: LSN {}: {}", path, lsn, e));

        let file = self.file_mut().map_err(|e| failed(first_lsn, e))?;
        let mut bytes = 0u64;
        let mut lsn = first_lsn;
        for operation in operations {
            let frame = WalEntry::new(lsn, operation).serialize()?;
            file.write_all(&frame).map_err(|e| failed(lsn, e))?;
            bytes += frame.len() as u64;
            lsn += 1;
        }
        let last_lsn = lsn - 1;
        file.flush().map_err(|e| failed(last_lsn, e))?;
        if due {
            file.get_ref().sync_data().map_err(|e| failed(last_lsn, e))?;
            self.uncommitted = 0;
        } else {
            self.uncommitted = uncommitted;
        }
        Ok(bytes)
    }

    /// Drop unwritten bytes and cut the file back to `offset`
    fn rollback(&mut self, offset: u64) {
        let Some(writer) = self.file.take() else {
            return;
        };
        let (mut file, _unwritten) = writer.into_parts();
        let restored = file
            .set_len(offset)
            .and_then(|_| file.seek(SeekFrom::Start(offset)));
        match restored {
            Ok(_) => self.file = Some(BufWriter::new(file)),
            Err(e) => tracing::error!(
                "WAL {}: could not roll back to offset {}: {}; writer disabled",
                self.path.display(),
                offset,
                e
            ),
        }
    }

    fn file_mut(&mut self) -> io::Result<&mut BufWriter<F>> {
        self.file.as_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Other,
                "writer disabled after a failed rollback",
            )
        })
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        let file = self.file_mut()?;
        file.flush()?;
        file.get_ref().sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// Get the LSN the next record will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Records written but not yet fsynced
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    /// Whether a failed rollback disabled the writer
    pub fn is_poisoned(&self) -> bool {
        self.file.is_none()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

//! WAL Entry definitions
//!
//! Defines the structure of individual WAL records and their framing.

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::{LogEntry, LogIndex, Term};
use crate::error::{LogError, Result};
use crate::state::MemberId;

/// Frame header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Largest record body accepted when reading (64 MB)
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Encoded size of an `Append` record excluding its entries (upper bound)
pub(crate) const APPEND_OVERHEAD: usize = 64;

/// Encoded size of one entry excluding its payload (upper bound)
pub(crate) const ENTRY_OVERHEAD: usize = 32;

/// Largest payload one entry may carry and still fit in a single record
pub const MAX_ENTRY_PAYLOAD: usize = MAX_RECORD_SIZE - APPEND_OVERHEAD - ENTRY_OVERHEAD;

/// A single record in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing, starts at 1
    pub lsn: u64,

    /// The state change being recorded
    pub operation: Operation,

    /// Timestamp (unix millis) when the record was created
    pub timestamp: u64,
}

/// State changes that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Current term and the vote cast in it
    Term {
        term: Term,
        voted_for: Option<MemberId>,
    },

    /// Entries occupying the log from `start_index`, replacing any suffix
    Append {
        start_index: LogIndex,
        entries: Vec<EntryRecord>,
    },

    /// Commit index advanced
    Commit { index: LogIndex },
}

/// Stored form of a [`LogEntry`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub term: Term,
    pub secs: i64,
    pub nanos: u32,
    pub payload: Vec<u8>,
    pub is_snapshot: bool,
}

impl From<&LogEntry> for EntryRecord {
    fn from(entry: &LogEntry) -> Self {
        let timestamp = entry.timestamp();
        Self {
            term: entry.term(),
            secs: timestamp.timestamp(),
            nanos: timestamp.timestamp_subsec_nanos(),
            payload: entry.payload().to_vec(),
            is_snapshot: entry.is_snapshot(),
        }
    }
}

impl EntryRecord {
    /// Rebuild the log entry
    pub fn into_entry(self) -> Result<LogEntry> {
        let timestamp = Utc
            .timestamp_opt(self.secs, self.nanos)
            .single()
            .ok_or_else(|| {
                LogError::WalCorruption(format!(
                    "invalid entry timestamp {}s {}ns",
                    self.secs, self.nanos
                ))
            })?;
        Ok(LogEntry::from_parts(
            self.term,
            timestamp,
            self.payload.into(),
            self.is_snapshot,
        ))
    }
}

/// Parsed frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: usize,
}

impl FrameHeader {
    pub(crate) fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&bytes[0..8]);
        crc.copy_from_slice(&bytes[8..12]);
        len.copy_from_slice(&bytes[12..16]);
        Self {
            lsn: u64::from_le_bytes(lsn),
            crc: u32::from_le_bytes(crc),
            len: u32::from_le_bytes(len) as usize,
        }
    }
}

impl WalEntry {
    /// Create a record stamped with the current time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        Self {
            lsn,
            operation,
            timestamp: Utc::now().timestamp_millis().max(0) as u64,
        }
    }

    /// Checksum over the record body
    pub fn compute_crc(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }

    /// Encode as a full frame: header followed by the bincode body
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data =
            bincode::serialize(self).map_err(|e| LogError::Serialization(e.to_string()))?;
        let len = u32::try_from(data.len())
            .ok()
            .filter(|len| *len as usize <= MAX_RECORD_SIZE)
            .ok_or_else(|| {
                LogError::WalWrite(format!(
                    "record of {} bytes exceeds the {} byte limit",
                    data.len(),
                    MAX_RECORD_SIZE
                ))
            })?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + data.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&Self::compute_crc(&data).to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&data);
        Ok(frame)
    }

    /// Decode one full frame
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(LogError::WalCorruption(format!(
                "incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&bytes[..HEADER_SIZE]);
        let header = FrameHeader::parse(&header);

        if header.len > MAX_RECORD_SIZE {
            return Err(LogError::WalCorruption(format!(
                "record length {} exceeds the {} byte limit",
                header.len, MAX_RECORD_SIZE
            )));
        }
        let body = &bytes[HEADER_SIZE..];
        if body.len() < header.len {
            return Err(LogError::WalCorruption(format!(
                "incomplete record: expected {} bytes, got {}",
                header.len,
                body.len()
            )));
        }

        Self::decode_body(&header, &body[..header.len])
    }

    /// Verify and decode a body against its header
    pub(crate) fn decode_body(header: &FrameHeader, data: &[u8]) -> Result<Self> {
        let actual = Self::compute_crc(data);
        if actual != header.crc {
            return Err(LogError::WalCorruption(format!(
                "CRC mismatch for LSN {}: expected {:08x}, got {:08x}",
                header.lsn, header.crc, actual
            )));
        }

        let entry: WalEntry =
            bincode::deserialize(data).map_err(|e| LogError::WalCorruption(e.to_string()))?;
        if entry.lsn != header.lsn {
            return Err(LogError::WalCorruption(format!(
                "header LSN {} does not match record LSN {}",
                header.lsn, entry.lsn
            )));
        }
        Ok(entry)
    }
}

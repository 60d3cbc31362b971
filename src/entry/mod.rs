//! Log Entry Module
//!
//! The immutable unit of the replicated log and the trait describing
//! entries as they arrive from the replication layer.
//!
//! ## Responsibilities
//! - Hold term, UTC timestamp, payload and snapshot flag
//! - Provide the sentinel entry at index 0
//! - Describe streamed entries (`EntrySource`) so the log never depends
//!   on the transport's representation
//!
//! ## Entry Layout
//! ```text
//! ┌──────────┬─────────────────┬──────────────┬──────────────┐
//! │ Term (8) │ Timestamp (UTC) │ Payload (N)  │ Snapshot (1) │
//! └──────────┴─────────────────┴──────────────┴──────────────┘
//! ```
//! The index is never stored; it is the entry's position in the log.

mod buffer;

pub use buffer::EntryBuffer;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use tokio::io::AsyncRead;

/// Term of a log entry (leadership epoch)
pub type Term = u64;

/// Position of an entry in the log; 0 is the sentinel
pub type LogIndex = u64;

/// An immutable entry in the replicated log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    term: Term,
    timestamp: DateTime<Utc>,
    payload: Bytes,
    is_snapshot: bool,
}

impl LogEntry {
    /// Create an entry stamped with the current time
    pub fn new(term: Term, payload: impl Into<Bytes>) -> Self {
        Self::from_parts(term, Utc::now(), payload.into(), false)
    }

    /// Create an entry with an explicit timestamp, normalized to UTC
    pub fn with_timestamp<Tz: TimeZone>(
        term: Term,
        timestamp: DateTime<Tz>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::from_parts(term, timestamp.with_timezone(&Utc), payload.into(), false)
    }

    /// Create an entry carrying compacted state
    pub fn snapshot(term: Term, payload: impl Into<Bytes>) -> Self {
        Self::from_parts(term, Utc::now(), payload.into(), true)
    }

    /// The entry stored at index 0: term 0, empty payload, epoch timestamp
    pub fn sentinel() -> Self {
        Self::from_parts(0, DateTime::<Utc>::default(), Bytes::new(), false)
    }

    pub(crate) fn from_parts(
        term: Term,
        timestamp: DateTime<Utc>,
        payload: Bytes,
        is_snapshot: bool,
    ) -> Self {
        Self {
            term,
            timestamp,
            payload,
            is_snapshot,
        }
    }

    pub fn term(&self) -> Term {
        self.term
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Payload bytes; clones share the same immutable buffer
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn is_snapshot(&self) -> bool {
        self.is_snapshot
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// An entry as handed over by the replication layer.
///
/// The payload may still be streaming (e.g. straight off a socket). The log
/// copies it through an [`EntryBuffer`] unless [`EntrySource::reusable`]
/// hands back an already materialized entry.
pub trait EntrySource: Send + Sync {
    fn term(&self) -> Term;

    /// Creation time in whatever offset the producer used
    fn timestamp(&self) -> DateTime<FixedOffset>;

    fn is_snapshot(&self) -> bool {
        false
    }

    /// Expected payload length, used to size the capture buffer
    fn length_hint(&self) -> Option<usize> {
        None
    }

    /// The entry itself, if this source is already immutable
    fn reusable(&self) -> Option<LogEntry> {
        None
    }

    /// Reader producing the payload bytes
    fn payload(&self) -> Box<dyn AsyncRead + Send + Unpin + '_>;
}

impl EntrySource for LogEntry {
    fn term(&self) -> Term {
        self.term
    }

    fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp.fixed_offset()
    }

    fn is_snapshot(&self) -> bool {
        self.is_snapshot
    }

    fn length_hint(&self) -> Option<usize> {
        Some(self.payload.len())
    }

    fn reusable(&self) -> Option<LogEntry> {
        Some(self.clone())
    }

    fn payload(&self) -> Box<dyn AsyncRead + Send + Unpin + '_> {
        Box::new(&self.payload[..])
    }
}

impl<T: EntrySource + ?Sized> EntrySource for Box<T> {
    fn term(&self) -> Term {
        (**self).term()
    }

    fn timestamp(&self) -> DateTime<FixedOffset> {
        (**self).timestamp()
    }

    fn is_snapshot(&self) -> bool {
        (**self).is_snapshot()
    }

    fn length_hint(&self) -> Option<usize> {
        (**self).length_hint()
    }

    fn reusable(&self) -> Option<LogEntry> {
        (**self).reusable()
    }

    fn payload(&self) -> Box<dyn AsyncRead + Send + Unpin + '_> {
        (**self).payload()
    }
}

impl<T: EntrySource + ?Sized> EntrySource for &T {
    fn term(&self) -> Term {
        (**self).term()
    }

    fn timestamp(&self) -> DateTime<FixedOffset> {
        (**self).timestamp()
    }

    fn is_snapshot(&self) -> bool {
        (**self).is_snapshot()
    }

    fn length_hint(&self) -> Option<usize> {
        (**self).length_hint()
    }

    fn reusable(&self) -> Option<LogEntry> {
        (**self).reusable()
    }

    fn payload(&self) -> Box<dyn AsyncRead + Send + Unpin + '_> {
        (**self).payload()
    }
}

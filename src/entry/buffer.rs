//! Entry buffering
//!
//! Copies a streamed payload into memory so the log only ever stores
//! immutable entries.

use bytes::BytesMut;
use chrono::Utc;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{LogError, Result};
use super::{EntrySource, LogEntry};

/// Captures [`EntrySource`]s into [`LogEntry`]s
#[derive(Debug, Clone)]
pub struct EntryBuffer {
    /// Starting size of each capture buffer
    initial_capacity: usize,

    /// Largest payload accepted
    limit: usize,
}

impl EntryBuffer {
    /// Default starting size of a capture buffer
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new(initial_capacity: usize, limit: usize) -> Self {
        Self {
            initial_capacity: initial_capacity.max(1),
            limit,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.buffer_initial_capacity, config.max_payload_size)
    }

    /// Materialize one entry.
    ///
    /// Reusable sources are returned as-is. Otherwise the payload is read to
    /// the end; the timestamp is normalized to UTC and the snapshot flag kept.
    pub async fn capture<S>(&self, source: &S, token: &CancellationToken) -> Result<LogEntry>
    where
        S: EntrySource + ?Sized,
    {
        if let Some(entry) = source.reusable() {
            return Ok(entry);
        }
        if token.is_cancelled() {
            return Err(LogError::Canceled);
        }

        let capacity = match source.length_hint() {
            Some(hint) if hint > self.limit => {
                return Err(LogError::PayloadTooLarge {
                    size: hint,
                    limit: self.limit,
                });
            }
            Some(hint) => hint,
            None => self.initial_capacity.min(self.limit),
        };

        let mut buf = BytesMut::with_capacity(capacity);
        let mut reader = source.payload();
        loop {
            if buf.len() == buf.capacity() {
                buf.reserve(self.initial_capacity);
            }

            let read = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(LogError::Canceled),
                read = reader.read_buf(&mut buf) => read?,
            };
            if read == 0 {
                break;
            }
            if buf.len() > self.limit {
                return Err(LogError::PayloadTooLarge {
                    size: buf.len(),
                    limit: self.limit,
                });
            }
        }

        Ok(LogEntry::from_parts(
            source.term(),
            source.timestamp().with_timezone(&Utc),
            buf.freeze(),
            source.is_snapshot(),
        ))
    }

    /// Materialize a batch, preserving order
    pub async fn capture_all<S>(
        &self,
        sources: &[S],
        token: &CancellationToken,
    ) -> Result<Vec<LogEntry>>
    where
        S: EntrySource,
    {
        let mut entries = Vec::with_capacity(sources.len());
        for source in sources {
            entries.push(self.capture(source, token).await?);
        }
        Ok(entries)
    }
}

impl Default for EntryBuffer {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

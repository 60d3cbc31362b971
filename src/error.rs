//! Error types for raftlog
//!
//! Provides a unified error type for all operations.

use std::time::Duration;

use thiserror::Error;

use crate::entry::LogIndex;

/// Result type alias using LogError
pub type Result<T> = std::result::Result<T, LogError>;

/// Unified error type for raftlog operations
#[derive(Debug, Error)]
pub enum LogError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Validation Errors
    // -------------------------------------------------------------------------
    #[error("Index {index} is out of range (log length {length})")]
    IndexOutOfRange { index: LogIndex, length: u64 },

    #[error("Entry set is empty")]
    EmptyBatch,

    #[error("Entry payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    // -------------------------------------------------------------------------
    // Safety Violations
    // -------------------------------------------------------------------------
    #[error("Cannot append at index {start_index}: entries up to {commit_index} are committed")]
    InvalidAppendIndex {
        start_index: LogIndex,
        commit_index: LogIndex,
    },

    // -------------------------------------------------------------------------
    // Waiting Errors
    // -------------------------------------------------------------------------
    #[error("Index {index} was not committed within {timeout:?}")]
    Timeout { index: LogIndex, timeout: Duration },

    #[error("Operation canceled")]
    Canceled,

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    #[error("Durability hook did not complete: {0}")]
    Durability(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LogError {
    /// Whether the error came from a commit wait that ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, LogError::Timeout { .. })
    }

    /// Whether the error came from a caller-side cancellation
    pub fn is_canceled(&self) -> bool {
        matches!(self, LogError::Canceled)
    }
}

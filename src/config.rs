//! Configuration for raftlog
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{LogError, Result};
use crate::wal::MAX_ENTRY_PAYLOAD;

/// Main configuration for a replicated log instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the write-ahead log.
    /// `None` keeps everything in memory (testing only).
    /// Internal structure:
    ///   {data_dir}/
    ///     └── raft.wal         (write-ahead log)
    pub data_dir: Option<PathBuf>,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // Entry Buffering Configuration
    // -------------------------------------------------------------------------
    /// Initial capacity of the buffer a streamed payload is copied into (bytes)
    pub buffer_initial_capacity: usize,

    /// Largest payload a single entry may carry (bytes)
    pub max_payload_size: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            wal_sync_strategy: WalSyncStrategy::EveryWrite,
            buffer_initial_capacity: 1024,
            max_payload_size: 16 * 1024 * 1024, // 16 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the buffering limits are usable
    pub fn validate(&self) -> Result<()> {
        if self.buffer_initial_capacity == 0 {
            return Err(LogError::Config(
                "buffer_initial_capacity must be greater than zero".to_string(),
            ));
        }
        if self.buffer_initial_capacity > self.max_payload_size {
            return Err(LogError::Config(format!(
                "buffer_initial_capacity ({}) exceeds max_payload_size ({})",
                self.buffer_initial_capacity, self.max_payload_size
            )));
        }
        if self.max_payload_size > MAX_ENTRY_PAYLOAD {
            return Err(LogError::Config(format!(
                "max_payload_size ({}) exceeds the {} byte WAL entry limit",
                self.max_payload_size, MAX_ENTRY_PAYLOAD
            )));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(LogError::Config(
                "EveryNEntries sync strategy needs a count of at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (enables the write-ahead log)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(path.into());
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the initial payload buffer capacity (in bytes)
    pub fn buffer_initial_capacity(mut self, size: usize) -> Self {
        self.config.buffer_initial_capacity = size;
        self
    }

    /// Set the maximum payload size (in bytes)
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.config.max_payload_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

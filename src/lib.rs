//! # raftlog
//!
//! The node-local replicated log and persistent-state store of a Raft node:
//! - Append-only log with a sentinel at index 0 and a monotonic commit index
//! - Conflict resolution by replacing an uncommitted suffix
//! - Current term and at most one vote per term
//! - Async wait-for-commit with timeout and cancellation
//! - Single-writer/multi-reader concurrency with copy-on-write snapshots
//! - Optional write-ahead log for restart recovery
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Replication / Election / Client RPCs            │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ append / commit / get_entries / term / vote
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    ReplicatedLog                             │
//! │      (EntryBuffer → exclusive guard → persist → publish)     │
//! └──────┬──────────────┬──────────────┬───────────────┬────────┘
//!        │              │              │               │
//!        ▼              ▼              ▼               ▼
//!  ┌───────────┐ ┌─────────────┐ ┌────────────┐ ┌─────────────┐
//!  │LogSnapshot│ │ Persistent  │ │  Commit    │ │ Durability  │
//!  │ (Arc COW) │ │   State     │ │  Waiter    │ │(Volatile/WAL│
//!  └───────────┘ └─────────────┘ └────────────┘ └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod entry;
pub mod state;
pub mod commit;
pub mod durability;
pub mod wal;
pub mod log;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LogError, Result};
pub use config::{Config, WalSyncStrategy};
pub use entry::{EntryBuffer, EntrySource, LogEntry, LogIndex, Term};
pub use state::MemberId;
pub use durability::{Durability, Volatile};
pub use log::{EntrySlice, ReplicatedLog};
pub use wal::MAX_ENTRY_PAYLOAD;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of raftlog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

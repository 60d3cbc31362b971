//! Write-Ahead Log (WAL) Module
//!
//! Provides durability for the replicated log through append-only logging.
//!
//! ## Responsibilities
//! - Record term/vote, append and commit operations before they are
//!   published
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) for ordering
//! - Crash recovery and replay
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//! Integers are little-endian; `Data` is the bincode-encoded `WalEntry`
//! and the CRC covers `Data` only.

mod entry;
mod writer;
mod reader;
mod recovery;
mod store;

pub use entry::{
    EntryRecord, Operation, WalEntry, HEADER_SIZE, MAX_ENTRY_PAYLOAD, MAX_RECORD_SIZE,
};
pub use writer::{WalFile, WalWriter};
pub use reader::{WalIterator, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use store::{RecoveredState, WalStore};

//! Replicated Log Module
//!
//! The node-local log and persistent-state store that the replication and
//! election layers call into.
//!
//! ## Responsibilities
//! - Append leader-supplied entries, replacing an uncommitted suffix on
//!   conflict
//! - Track and advance the commit index, waking commit waiters
//! - Serve entry ranges as immutable snapshots
//! - Store the current term and vote
//!
//! ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
//!
//! - **Writes** (append/commit/term/vote): serialized by the exclusive side
//!   of `guard`. Payload buffering runs before the guard is taken.
//! - **Range reads** (get_entries): shared side of `guard`; many at once.
//! - **Point reads** (last_index/term/is_voted_for): atomics and the
//!   published snapshot; they never wait for a writer.
//!
//! Every write builds the new state, runs the durability hook, and only then
//! publishes (snapshot swap, atomic store) before releasing the guard. A
//! failed write publishes nothing.
//!
//! Hooks of a blocking backend run on tokio's blocking pool. The exclusive
//! guard travels with the hook, so a writer whose future is dropped while
//! its hook runs still keeps the next writer out until the hook returns.

mod snapshot;

pub use snapshot::EntrySlice;

use std::fmt;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tokio_util::sync::CancellationToken;

use crate::commit::CommitWaiter;
use crate::config::Config;
use crate::durability::{Durability, Volatile};
use crate::entry::{EntryBuffer, EntrySource, LogEntry, LogIndex, Term};
use crate::error::{LogError, Result};
use crate::state::{MemberId, PersistentState};
use crate::wal::{RecoveredState, WalRecovery, WalStore};
use snapshot::LogSnapshot;

/// Replicated log with term/vote state
pub struct ReplicatedLog {
    config: Config,

    /// Captures streamed entries before they enter the log
    buffer: EntryBuffer,

    /// Shared for range reads, exclusive for every mutation
    guard: Arc<RwLock<()>>,

    /// Published entries; the lock is held only to clone or swap the pointer
    snapshot: parking_lot::RwLock<LogSnapshot>,

    commit_index: AtomicU64,

    state: PersistentState,

    commits: CommitWaiter,

    durability: Arc<dyn Durability>,
}

impl ReplicatedLog {
    /// Name of the WAL file inside the data directory
    pub const WAL_FILENAME: &'static str = "raft.wal";

    /// Create an in-memory log holding only the sentinel
    pub fn new(config: Config) -> Self {
        Self::with_durability(config, Box::new(Volatile))
    }

    /// Create an empty log persisting through `durability`
    pub fn with_durability(config: Config, durability: Box<dyn Durability>) -> Self {
        Self::assemble(config, durability, RecoveredState::default())
    }

    /// Open a log as described by `config`
    ///
    /// Without a data directory this is [`ReplicatedLog::new`]. Otherwise:
    /// 1. Create the data directory if needed
    /// 2. Recover the WAL if it exists (torn or corrupt tails are dropped)
    /// 3. Replay term, vote, entries and commit index
    /// 4. Resume appending to the same WAL
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let data_dir = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => return Ok(Self::new(config)),
        };

        // Step 1: Create data directory if it doesn't exist
        fs::create_dir_all(&data_dir)?;
        let wal_path = data_dir.join(Self::WAL_FILENAME);

        // Step 2 + 3: Recover and replay
        let recovered = if wal_path.exists() {
            let (records, result) = WalRecovery::recover(&wal_path)?;
            if result.entries_corrupted > 0 {
                tracing::warn!(
                    "Ignored {} corrupted WAL record(s) after LSN {}",
                    result.entries_corrupted,
                    result.last_lsn
                );
            }
            WalStore::replay(records)?
        } else {
            RecoveredState::default()
        };

        // Step 4: Reopen for appending
        let store = WalStore::open(&wal_path, config.wal_sync_strategy)?;

        tracing::info!(
            term = recovered.term,
            entries = recovered.entries.len(),
            commit_index = recovered.commit_index,
            next_lsn = store.current_lsn(),
            "Opened replicated log at {}",
            data_dir.display()
        );
        Ok(Self::assemble(config, Box::new(store), recovered))
    }

    fn assemble(config: Config, durability: Box<dyn Durability>, recovered: RecoveredState) -> Self {
        Self {
            buffer: EntryBuffer::from_config(&config),
            config,
            guard: Arc::new(RwLock::new(())),
            snapshot: parking_lot::RwLock::new(LogSnapshot::from_entries(recovered.entries)),
            commit_index: AtomicU64::new(recovered.commit_index),
            state: PersistentState::restore(recovered.term, recovered.voted_for),
            commits: CommitWaiter::new(recovered.commit_index),
            durability: Arc::from(durability),
        }
    }

    // =========================================================================
    // Log Reads
    // =========================================================================

    /// The sentinel entry at index 0
    pub fn first(&self) -> LogEntry {
        self.current()
            .get(0)
            .cloned()
            .unwrap_or_else(LogEntry::sentinel)
    }

    /// Index of the highest committed entry, or of the last entry
    pub fn last_index(&self, committed: bool) -> LogIndex {
        if committed {
            self.commit_index.load(Ordering::Acquire)
        } else {
            self.current().last_index()
        }
    }

    /// Entries in `[start_index, end_index]`
    ///
    /// `end_index` must exist. A range with `end_index < start_index` is
    /// empty rather than an error.
    pub async fn get_entries(&self, start_index: LogIndex, end_index: LogIndex) -> Result<EntrySlice> {
        let _shared = self.guard.read().await;
        self.current().slice(start_index, end_index)
    }

    /// Entries from `start_index` to the end of the log
    pub async fn get_entries_from(&self, start_index: LogIndex) -> Result<EntrySlice> {
        let _shared = self.guard.read().await;
        let snapshot = self.current();
        snapshot.slice(start_index, snapshot.last_index())
    }

    // =========================================================================
    // Log Writes
    // =========================================================================

    /// Add entries to the log, returning the index of the first one
    ///
    /// With `start_index = None` the batch goes after the last entry.
    /// With `Some(index)` every entry at or after `index` is replaced by the
    /// batch; `index` must be past the commit index.
    pub async fn append<S: EntrySource>(
        &self,
        entries: &[S],
        start_index: Option<LogIndex>,
    ) -> Result<LogIndex> {
        self.append_with_token(entries, start_index, &CancellationToken::new())
            .await
    }

    /// [`ReplicatedLog::append`] whose buffering phase can be canceled
    pub async fn append_with_token<S: EntrySource>(
        &self,
        entries: &[S],
        start_index: Option<LogIndex>,
        token: &CancellationToken,
    ) -> Result<LogIndex> {
        if entries.is_empty() {
            return Err(LogError::EmptyBatch);
        }

        // Buffer payloads before taking the write guard
        let entries = self.buffer.capture_all(entries, token).await?;

        let exclusive = self.exclusive().await;
        let current = self.current();
        let start = match start_index {
            None => current.len(),
            Some(start) => {
                let commit_index = self.commit_index.load(Ordering::Acquire);
                if start <= commit_index {
                    tracing::warn!(
                        "Rejected append at {}: commit index is {}",
                        start,
                        commit_index
                    );
                    return Err(LogError::InvalidAppendIndex {
                        start_index: start,
                        commit_index,
                    });
                }
                if start > current.len() {
                    return Err(LogError::IndexOutOfRange {
                        index: start,
                        length: current.len(),
                    });
                }
                start
            }
        };

        let (_exclusive, entries) = self
            .persist(exclusive, move |durability| {
                durability.persist_append(start, &entries).map(|()| entries)
            })
            .await?;

        let count = entries.len();
        let discarded = current.len() - start;
        *self.snapshot.write() = current.splice(start, entries);

        tracing::debug!(start, count, discarded, "Appended entries");
        Ok(start)
    }

    /// Advance the commit index, returning how many entries became committed
    ///
    /// Commits up to `end_index`, or to the last entry when `None`. Returns 0
    /// when nothing new would be committed.
    pub async fn commit(&self, end_index: Option<LogIndex>) -> Result<u64> {
        let exclusive = self.exclusive().await;
        let last_index = self.current().last_index();
        let target = end_index.unwrap_or(last_index);
        if target > last_index {
            return Err(LogError::IndexOutOfRange {
                index: target,
                length: last_index + 1,
            });
        }

        let start = self.commit_index.load(Ordering::Acquire) + 1;
        if target < start {
            return Ok(0);
        }

        let (_exclusive, ()) = self
            .persist(exclusive, move |durability| durability.persist_commit(target))
            .await?;
        self.commit_index.store(target, Ordering::Release);
        self.commits.publish(target);

        let count = target - start + 1;
        tracing::debug!(commit_index = target, count, "Committed entries");
        Ok(count)
    }

    /// Wait until the entry at `index` is committed
    ///
    /// Index 0 (the sentinel) is rejected. Fails with
    /// [`LogError::Timeout`] or [`LogError::Canceled`].
    pub async fn wait_for_commit(
        &self,
        index: LogIndex,
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<()> {
        if index == 0 {
            return Err(LogError::IndexOutOfRange {
                index,
                length: self.current().len(),
            });
        }
        self.commits.wait(index, timeout, token).await
    }

    // =========================================================================
    // Term and Vote
    // =========================================================================

    /// Current term (atomic read)
    pub fn term(&self) -> Term {
        self.state.term()
    }

    /// Store `term`; a different value clears the recorded vote
    pub async fn update_term(&self, term: Term) -> Result<()> {
        let exclusive = self.exclusive().await;
        let vote = if term == self.state.term() {
            self.state.voted_for()
        } else {
            None
        };
        let (_exclusive, ()) = self
            .persist(exclusive, move |durability| durability.persist_term(term, vote))
            .await?;
        if self.state.set_term(term) {
            tracing::debug!(term, "Term changed");
        }
        Ok(())
    }

    /// Start the next term with no vote cast; returns the new term
    pub async fn increment_term(&self) -> Result<Term> {
        let exclusive = self.exclusive().await;
        let next = self.state.term() + 1;
        let (_exclusive, ()) = self
            .persist(exclusive, move |durability| durability.persist_term(next, None))
            .await?;
        let term = self.state.increment_term();
        tracing::debug!(term, "Term incremented");
        Ok(term)
    }

    pub fn voted_for(&self) -> Option<MemberId> {
        self.state.voted_for()
    }

    /// True when no vote is recorded this term or it went to `candidate`
    pub fn is_voted_for(&self, candidate: MemberId) -> bool {
        self.state.is_voted_for(candidate)
    }

    /// Record a vote for `candidate` in the current term
    pub async fn update_voted_for(&self, candidate: MemberId) -> Result<()> {
        let exclusive = self.exclusive().await;
        let term = self.state.term();
        let (_exclusive, ()) = self
            .persist(exclusive, move |durability| {
                durability.persist_term(term, Some(candidate))
            })
            .await?;
        self.state.set_voted_for(candidate);
        tracing::debug!(term, %candidate, "Vote recorded");
        Ok(())
    }

    // =========================================================================
    // Lifecycle and Accessors
    // =========================================================================

    /// Number of tasks blocked in [`ReplicatedLog::wait_for_commit`]
    pub fn commit_waiters(&self) -> usize {
        self.commits.waiters()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flush the durability backend and release the log
    pub fn close(self) -> Result<()> {
        self.durability.sync()
    }

    fn current(&self) -> LogSnapshot {
        self.snapshot.read().clone()
    }

    async fn exclusive(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.guard).write_owned().await
    }

    /// Run `hook` against the durability backend, handing back the guard
    ///
    /// Blocking backends run on the blocking pool with the guard moved in.
    async fn persist<T, F>(
        &self,
        exclusive: OwnedRwLockWriteGuard<()>,
        hook: F,
    ) -> Result<(OwnedRwLockWriteGuard<()>, T)>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Durability) -> Result<T> + Send + 'static,
    {
        if !self.durability.is_blocking() {
            let value = hook(&*self.durability)?;
            return Ok((exclusive, value));
        }

        let durability = Arc::clone(&self.durability);
        let (exclusive, result) = tokio::task::spawn_blocking(move || {
            let result = hook(&*durability);
            (exclusive, result)
        })
        .await
        .map_err(|e| LogError::Durability(e.to_string()))?;
        result.map(|value| (exclusive, value))
    }
}

impl fmt::Debug for ReplicatedLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicatedLog")
            .field("last_index", &self.last_index(false))
            .field("commit_index", &self.last_index(true))
            .field("state", &self.state)
            .field("durability", &self.durability)
            .finish()
    }
}

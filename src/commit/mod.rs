//! Commit Notification Module
//!
//! Lets callers suspend until the commit index reaches a target.
//!
//! ## Design
//! A `watch` channel carries the commit index. Every commit that advances
//! the index replaces the value, which wakes all waiters at once. Waiters
//! are not addressed by target: each one re-reads the index on wake-up and
//! either completes or waits again, so a high target may take several
//! commits to reach.

use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::entry::LogIndex;
use crate::error::{LogError, Result};

/// Broadcasts commit index changes to any number of waiters
#[derive(Debug)]
pub struct CommitWaiter {
    tx: watch::Sender<LogIndex>,
}

impl CommitWaiter {
    pub fn new(commit_index: LogIndex) -> Self {
        let (tx, _rx) = watch::channel(commit_index);
        Self { tx }
    }

    /// Publish a new commit index and wake every waiter
    pub fn publish(&self, commit_index: LogIndex) {
        self.tx.send_replace(commit_index);
    }

    /// Number of tasks currently waiting
    pub fn waiters(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Wait until the published index is at least `target`.
    ///
    /// Fails with [`LogError::Timeout`] once `timeout` elapses and with
    /// [`LogError::Canceled`] when `token` fires. A target that is already
    /// reached completes without waiting.
    pub async fn wait(
        &self,
        target: LogIndex,
        timeout: Duration,
        token: &CancellationToken,
    ) -> Result<()> {
        let mut rx = self.tx.subscribe();
        if *rx.borrow_and_update() >= target {
            return Ok(());
        }

        let reached = async {
            loop {
                // Sender lives as long as `self`, so this only fails if the
                // waiter outlives the log.
                if rx.changed().await.is_err() {
                    return Err(LogError::Canceled);
                }
                if *rx.borrow_and_update() >= target {
                    return Ok(());
                }
            }
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(LogError::Canceled),
            outcome = tokio::time::timeout(timeout, reached) => match outcome {
                Ok(result) => result,
                Err(_) => Err(LogError::Timeout { index: target, timeout }),
            },
        }
    }
}

impl Default for CommitWaiter {
    fn default() -> Self {
        Self::new(0)
    }
}

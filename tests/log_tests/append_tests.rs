use chrono::{FixedOffset, TimeZone, Utc};
use raftlog::{EntrySource, LogEntry, LogError};
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use super::{entry, log_with, new_log, payloads};

/// Entry that must be copied out of its reader
struct Streamed {
    term: u64,
    payload: Vec<u8>,
}

impl EntrySource for Streamed {
    fn term(&self) -> u64 {
        self.term
    }

    fn timestamp(&self) -> chrono::DateTime<FixedOffset> {
        FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 1, 15, 30, 0)
            .unwrap()
    }

    fn payload(&self) -> Box<dyn AsyncRead + Send + Unpin + '_> {
        Box::new(&self.payload[..])
    }
}

// =============================================================================
// Append at End
// =============================================================================

#[tokio::test]
async fn test_append_to_fresh_log_starts_after_sentinel() {
    let log = new_log();

    let index = log.append(&[entry(1, 1), entry(1, 2)], None).await.unwrap();

    assert_eq!(index, 1);
    assert_eq!(log.last_index(false), 2);
    assert_eq!(payloads(&log, 1, 2).await, vec![1, 2]);
}

#[tokio::test]
async fn test_append_grows_by_batch_size() {
    let log = log_with(3).await;

    let index = log
        .append(&[entry(2, 4), entry(2, 5), entry(2, 6)], None)
        .await
        .unwrap();

    assert_eq!(index, 4);
    assert_eq!(log.last_index(false), 6);
    assert_eq!(payloads(&log, 4, 6).await, vec![4, 5, 6]);
}

#[tokio::test]
async fn test_append_empty_batch_fails() {
    let log = log_with(2).await;
    let empty: Vec<LogEntry> = Vec::new();

    let result = log.append(&empty, None).await;

    assert!(matches!(result, Err(LogError::EmptyBatch)));
    assert_eq!(log.last_index(false), 2);
}

#[tokio::test]
async fn test_append_at_current_length_is_plain_append() {
    let log = log_with(2).await;

    let index = log.append(&[entry(1, 3)], Some(3)).await.unwrap();

    assert_eq!(index, 3);
    assert_eq!(payloads(&log, 1, 3).await, vec![1, 2, 3]);
}

// =============================================================================
// Conflict Resolution
// =============================================================================

#[tokio::test]
async fn test_append_with_start_index_replaces_suffix() {
    let log = log_with(5).await;
    log.commit(Some(2)).await.unwrap();

    let index = log.append(&[entry(2, 6), entry(2, 7)], Some(3)).await.unwrap();

    assert_eq!(index, 3);
    assert_eq!(log.last_index(false), 4);
    assert_eq!(payloads(&log, 1, 4).await, vec![1, 2, 6, 7]);

    let replaced = log.get_entries(3, 4).await.unwrap();
    assert!(replaced.iter().all(|e| e.term() == 2));
}

#[tokio::test]
async fn test_append_at_commit_index_is_rejected() {
    let log = log_with(3).await;
    log.commit(Some(2)).await.unwrap();

    let result = log.append(&[entry(2, 9)], Some(2)).await;

    match result {
        Err(LogError::InvalidAppendIndex {
            start_index,
            commit_index,
        }) => {
            assert_eq!(start_index, 2);
            assert_eq!(commit_index, 2);
        }
        other => panic!("Expected InvalidAppendIndex, got {:?}", other),
    }
    assert_eq!(log.last_index(false), 3);
    assert_eq!(payloads(&log, 1, 3).await, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_append_below_commit_index_is_rejected() {
    let log = log_with(4).await;
    log.commit(None).await.unwrap();

    for start in 1..=4 {
        let result = log.append(&[entry(5, 0)], Some(start)).await;
        assert!(matches!(result, Err(LogError::InvalidAppendIndex { .. })));
    }
    assert_eq!(payloads(&log, 1, 4).await, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_append_at_sentinel_is_rejected() {
    let log = log_with(1).await;

    let result = log.append(&[entry(1, 9)], Some(0)).await;

    assert!(matches!(result, Err(LogError::InvalidAppendIndex { .. })));
    assert_eq!(log.first(), LogEntry::sentinel());
}

#[tokio::test]
async fn test_append_past_end_leaves_no_gap() {
    let log = log_with(2).await;

    let result = log.append(&[entry(1, 9)], Some(5)).await;

    assert!(matches!(
        result,
        Err(LogError::IndexOutOfRange { index: 5, length: 3 })
    ));
    assert_eq!(log.last_index(false), 2);
}

#[tokio::test]
async fn test_committed_entries_survive_later_appends() {
    let log = log_with(3).await;
    log.commit(Some(2)).await.unwrap();
    let before = log.get_entries(1, 2).await.unwrap().to_vec();

    log.append(&[entry(3, 7)], Some(3)).await.unwrap();
    log.append(&[entry(3, 8), entry(3, 9)], None).await.unwrap();
    let _ = log.append(&[entry(4, 0)], Some(1)).await;

    let after = log.get_entries(1, 2).await.unwrap();
    assert_eq!(after, before);
}

// =============================================================================
// Buffering
// =============================================================================

#[tokio::test]
async fn test_append_buffers_streamed_entries() {
    let log = new_log();
    let sources = vec![
        Streamed {
            term: 4,
            payload: b"first".to_vec(),
        },
        Streamed {
            term: 4,
            payload: b"second".to_vec(),
        },
    ];

    log.append(&sources, None).await.unwrap();

    let stored = log.get_entries(1, 2).await.unwrap();
    assert_eq!(stored[0].payload().as_ref(), b"first");
    assert_eq!(stored[1].payload().as_ref(), b"second");
    assert_eq!(stored[0].term(), 4);
    assert_eq!(
        stored[0].timestamp(),
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
    );
}

#[tokio::test]
async fn test_append_accepts_mixed_sources() {
    let log = new_log();
    let sources: Vec<Box<dyn EntrySource>> = vec![
        Box::new(entry(1, 1)),
        Box::new(Streamed {
            term: 1,
            payload: vec![2],
        }),
    ];

    let index = log.append(&sources, None).await.unwrap();

    assert_eq!(index, 1);
    assert_eq!(payloads(&log, 1, 2).await, vec![1, 2]);
}

#[tokio::test]
async fn test_canceled_buffering_leaves_log_unchanged() {
    let log = log_with(1).await;
    let token = CancellationToken::new();
    token.cancel();
    let sources = vec![Streamed {
        term: 1,
        payload: vec![0; 64],
    }];

    let result = log.append_with_token(&sources, None, &token).await;

    assert!(matches!(result, Err(LogError::Canceled)));
    assert_eq!(log.last_index(false), 1);
}

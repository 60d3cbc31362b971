//! Tests for LogEntry and EntryBuffer
//!
//! These tests verify:
//! - Sentinel and constructor invariants
//! - Reusable entries are shared, streamed ones copied
//! - Capture buffer growth and the payload limit
//! - Reader errors and cancellation while buffering

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use raftlog::{EntryBuffer, EntrySource, LogEntry, LogError};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::sync::CancellationToken;

// =============================================================================
// Helper Sources
// =============================================================================

fn plus_two(h: u32, m: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(2 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 1, 15, h, m, 0)
        .unwrap()
}

/// Payload streamed from memory, with an optional length hint
struct Streamed {
    payload: Vec<u8>,
    hint: Option<usize>,
    snapshot: bool,
}

impl Streamed {
    fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            hint: None,
            snapshot: false,
        }
    }
}

impl EntrySource for Streamed {
    fn term(&self) -> u64 {
        7
    }

    fn timestamp(&self) -> DateTime<FixedOffset> {
        plus_two(12, 0)
    }

    fn is_snapshot(&self) -> bool {
        self.snapshot
    }

    fn length_hint(&self) -> Option<usize> {
        self.hint
    }

    fn payload(&self) -> Box<dyn AsyncRead + Send + Unpin + '_> {
        Box::new(&self.payload[..])
    }
}

/// Reader that fails on the first poll
struct BrokenPipe;

impl AsyncRead for BrokenPipe {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away")))
    }
}

/// Reader that never produces data
struct Stalled;

impl AsyncRead for Stalled {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

/// Source wrapping one of the failing readers above
struct Faulty {
    stalled: bool,
}

impl EntrySource for Faulty {
    fn term(&self) -> u64 {
        1
    }

    fn timestamp(&self) -> DateTime<FixedOffset> {
        plus_two(0, 0)
    }

    fn payload(&self) -> Box<dyn AsyncRead + Send + Unpin + '_> {
        if self.stalled {
            Box::new(Stalled)
        } else {
            Box::new(BrokenPipe)
        }
    }
}

// =============================================================================
// LogEntry Tests
// =============================================================================

#[test]
fn test_sentinel_shape() {
    let sentinel = LogEntry::sentinel();

    assert_eq!(sentinel.term(), 0);
    assert!(sentinel.is_empty());
    assert!(!sentinel.is_snapshot());
    assert_eq!(sentinel.timestamp().timestamp(), 0);
}

#[test]
fn test_with_timestamp_normalizes_to_utc() {
    let entry = LogEntry::with_timestamp(3, plus_two(14, 45), vec![1, 2, 3]);

    assert_eq!(
        entry.timestamp(),
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 45, 0).unwrap()
    );
    assert_eq!(entry.len(), 3);
    assert!(!entry.is_snapshot());
}

#[test]
fn test_snapshot_constructor_sets_flag() {
    let entry = LogEntry::snapshot(4, &b"state"[..]);

    assert!(entry.is_snapshot());
    assert_eq!(entry.term(), 4);
    assert_eq!(&entry.payload()[..], b"state");
}

// =============================================================================
// Capture Tests
// =============================================================================

#[tokio::test]
async fn test_reusable_entry_is_shared() {
    let buffer = EntryBuffer::default();
    let original = LogEntry::new(1, vec![9; 64]);

    let captured = buffer
        .capture(&original, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(captured, original);
    assert_eq!(captured.payload().as_ptr(), original.payload().as_ptr());
}

#[tokio::test]
async fn test_streamed_entry_is_copied() {
    let buffer = EntryBuffer::default();
    let mut source = Streamed::new(b"streamed payload".to_vec());
    source.snapshot = true;

    let captured = buffer
        .capture(&source, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(&captured.payload()[..], b"streamed payload");
    assert_eq!(captured.term(), 7);
    assert!(captured.is_snapshot());
    assert_eq!(
        captured.timestamp(),
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn test_capture_grows_past_initial_capacity() {
    let buffer = EntryBuffer::new(4, 1024);
    let payload: Vec<u8> = (0..=255).collect();

    let captured = buffer
        .capture(&Streamed::new(payload.clone()), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(&captured.payload()[..], &payload[..]);
}

#[tokio::test]
async fn test_empty_stream_gives_empty_payload() {
    let buffer = EntryBuffer::default();

    let captured = buffer
        .capture(&Streamed::new(Vec::new()), &CancellationToken::new())
        .await
        .unwrap();

    assert!(captured.is_empty());
}

#[tokio::test]
async fn test_length_hint_over_limit_is_rejected() {
    let buffer = EntryBuffer::new(16, 32);
    let mut source = Streamed::new(vec![0; 8]);
    source.hint = Some(64);

    let result = buffer.capture(&source, &CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(LogError::PayloadTooLarge { size: 64, limit: 32 })
    ));
}

#[tokio::test]
async fn test_stream_over_limit_is_rejected() {
    let buffer = EntryBuffer::new(4, 8);

    let result = buffer
        .capture(&Streamed::new(vec![1; 20]), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(LogError::PayloadTooLarge { limit: 8, .. })));
}

#[tokio::test]
async fn test_reader_error_is_propagated() {
    let buffer = EntryBuffer::default();

    let result = buffer
        .capture(&Faulty { stalled: false }, &CancellationToken::new())
        .await;

    match result {
        Err(LogError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("expected io error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_capture_canceled_before_start() {
    let buffer = EntryBuffer::default();
    let token = CancellationToken::new();
    token.cancel();

    let result = buffer.capture(&Streamed::new(vec![1]), &token).await;

    assert!(matches!(result, Err(LogError::Canceled)));
}

#[tokio::test]
async fn test_capture_canceled_while_reading() {
    let buffer = EntryBuffer::default();
    let token = CancellationToken::new();

    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        })
    };

    let result = buffer.capture(&Faulty { stalled: true }, &token).await;

    assert!(matches!(result, Err(LogError::Canceled)));
    canceller.await.unwrap();
}

#[tokio::test]
async fn test_capture_all_preserves_order() {
    let buffer = EntryBuffer::default();
    let sources: Vec<Box<dyn EntrySource>> = vec![
        Box::new(LogEntry::new(1, vec![1])),
        Box::new(Streamed::new(vec![2])),
        Box::new(LogEntry::new(1, vec![3])),
    ];

    let entries = buffer
        .capture_all(&sources, &CancellationToken::new())
        .await
        .unwrap();

    let bytes: Vec<u8> = entries.iter().map(|e| e.payload()[0]).collect();
    assert_eq!(bytes, vec![1, 2, 3]);
}

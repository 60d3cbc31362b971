use raftlog::LogError;

use super::{entry, log_with, new_log};

#[tokio::test]
async fn test_commit_all_on_fresh_log() {
    let log = new_log();
    log.append(&[entry(1, 1), entry(1, 2)], None).await.unwrap();

    let count = log.commit(None).await.unwrap();

    assert_eq!(count, 2);
    assert_eq!(log.last_index(true), 2);
}

#[tokio::test]
async fn test_commit_with_nothing_appended() {
    let log = new_log();

    assert_eq!(log.commit(None).await.unwrap(), 0);
    assert_eq!(log.last_index(true), 0);
}

#[tokio::test]
async fn test_commit_up_to_index() {
    let log = log_with(5).await;

    assert_eq!(log.commit(Some(3)).await.unwrap(), 3);
    assert_eq!(log.last_index(true), 3);
    assert_eq!(log.last_index(false), 5);

    assert_eq!(log.commit(None).await.unwrap(), 2);
    assert_eq!(log.last_index(true), 5);
}

#[tokio::test]
async fn test_commit_is_idempotent() {
    let log = log_with(4).await;

    assert_eq!(log.commit(Some(2)).await.unwrap(), 2);
    assert_eq!(log.commit(Some(2)).await.unwrap(), 0);
    assert_eq!(log.commit(Some(1)).await.unwrap(), 0);
    assert_eq!(log.commit(Some(0)).await.unwrap(), 0);
    assert_eq!(log.last_index(true), 2);
}

#[tokio::test]
async fn test_commit_none_after_full_commit_returns_zero() {
    let log = log_with(2).await;
    log.commit(None).await.unwrap();

    assert_eq!(log.commit(None).await.unwrap(), 0);
    assert_eq!(log.last_index(true), 2);
}

#[tokio::test]
async fn test_commit_past_last_entry_fails() {
    let log = log_with(2).await;

    let result = log.commit(Some(3)).await;

    assert!(matches!(
        result,
        Err(LogError::IndexOutOfRange { index: 3, length: 3 })
    ));
    assert_eq!(log.last_index(true), 0);
}

#[tokio::test]
async fn test_commit_index_never_exceeds_last_index() {
    let log = log_with(3).await;
    log.commit(Some(2)).await.unwrap();
    log.append(&[entry(2, 9)], Some(3)).await.unwrap();
    log.commit(None).await.unwrap();

    assert!(log.last_index(true) <= log.last_index(false));
    assert_eq!(log.last_index(true), 3);
}

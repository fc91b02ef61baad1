use crate::store::*;
use crate::types::TaskStatus;
use std::time::Duration;

#[tokio::test]
async fn test_counts_on_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("tasks.db")).await.unwrap();

    let counts = store.counts().await.unwrap();
    assert_eq!(counts.total(), 0);
}

#[tokio::test]
async fn test_list_filters_by_status_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("tasks.db")).await.unwrap();
    store.add_many(["c", "a", "b"]).await.unwrap();
    let taken = store.take("").await.unwrap().unwrap();

    let pending: Vec<String> = store
        .list(TaskStatus::Pending)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(pending.len(), 2);
    assert!(!pending.contains(&taken));
    let mut sorted = pending.clone();
    sorted.sort();
    assert_eq!(pending, sorted);

    let taken_rows = store.list(TaskStatus::Taken).await.unwrap();
    assert_eq!(taken_rows.len(), 1);
    assert_eq!(taken_rows[0].name, taken);
}

#[tokio::test]
async fn test_stale_claims_reports_old_taken_tasks_only() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("tasks.db")).await.unwrap();
    store.add_many(["a", "b"]).await.unwrap();
    let stuck = store.take("").await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    let stale = store.stale_claims(Duration::from_millis(10)).await.unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].name, stuck);
    assert_eq!(stale[0].status, TaskStatus::Taken, "reporting never re-queues");

    let fresh = store.stale_claims(Duration::from_secs(3600)).await.unwrap();
    assert!(fresh.is_empty());

    // Finalized tasks are no longer stale
    store.processed(&stuck, "").await.unwrap();
    assert!(
        store
            .stale_claims(Duration::from_millis(10))
            .await
            .unwrap()
            .is_empty()
    );
}

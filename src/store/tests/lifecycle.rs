use crate::error::StoreError;
use crate::store::*;
use crate::types::TaskStatus;
use crate::Error;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_open_creates_file_and_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("tasks.db");
    assert!(!path.exists());

    let store = Store::open(&path).await.unwrap();
    assert!(path.exists(), "open creates the backing file");

    let mut conn = store.pool().acquire().await.unwrap();
    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(&mut *conn)
            .await
            .unwrap();
    assert!(tables.contains(&"task".to_string()));
    assert!(tables.contains(&"schema_version".to_string()));

    let indexes: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='task'")
            .fetch_all(&mut *conn)
            .await
            .unwrap();
    assert!(indexes.contains(&"by_status".to_string()));
    drop(conn);

    store.close().await;
}

#[tokio::test]
async fn test_open_under_a_file_fails() {
    let blocker = NamedTempFile::new().unwrap();
    let path = blocker.path().join("tasks.db");

    let result = Store::open(&path).await;
    assert!(
        matches!(result, Err(Error::Store(StoreError::OpenFailed(_)))),
        "expected open failure, got {:?}",
        result.err()
    );
}

#[tokio::test]
async fn test_reopen_preserves_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");

    {
        let store = Store::open(&path).await.unwrap();
        store.add_many(["a", "b", "c", "d"]).await.unwrap();
        let taken = store.take("").await.unwrap().unwrap();
        store.processed(&taken, "").await.unwrap();
        let taken = store.take("").await.unwrap().unwrap();
        store.cancelled(&taken, "boom").await.unwrap();
        store.take("").await.unwrap().unwrap();
        store.close().await;
    }

    let store = Store::open(&path).await.unwrap();
    let counts = store.counts().await.unwrap();
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.taken, 1);
    assert_eq!(counts.processed, 1);
    assert_eq!(counts.cancelled, 1);

    let cancelled = store.list(TaskStatus::Cancelled).await.unwrap();
    assert_eq!(cancelled[0].detail.as_deref(), Some("boom"));

    // Migrations are not re-applied
    let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_version")
        .fetch_all(store.pool())
        .await
        .unwrap();
    assert_eq!(versions, vec![1]);

    store.close().await;
}

#[tokio::test]
async fn test_reinitialize_wipes_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tasks.db");
    let store = Store::open(&path).await.unwrap();
    store.add_many(["a", "b"]).await.unwrap();

    store.reinitialize().await.unwrap();

    assert_eq!(store.counts().await.unwrap().total(), 0);
    // Names can be reused after the wipe
    store.add("a", "").await.unwrap();
    assert_eq!(store.take("").await.unwrap().as_deref(), Some("a"));
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("tasks.db")).await.unwrap();

    store.close().await;
    store.close().await;
    assert!(store.is_closed());
}

#[tokio::test]
async fn test_operations_after_close_fail() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("tasks.db")).await.unwrap();
    store.add("a", "").await.unwrap();
    store.close().await;

    assert!(matches!(
        store.take("").await,
        Err(Error::Store(StoreError::Closed))
    ));
    assert!(matches!(
        store.add("b", "").await,
        Err(Error::Store(StoreError::Closed))
    ));
    assert!(matches!(
        store.get_status("a").await,
        Err(Error::Store(StoreError::Closed))
    ));
}

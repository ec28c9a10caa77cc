//! LocalAdapter over file and in-memory blob stores

use lego_kanban::{
    BoardItem, ColumnConfig, ColumnId, FileBlobStore, KanbanError, KanbanStore, LocalAdapter,
    MemoryBlobStore, PersistenceAdapter,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Task {
    id: String,
    status: String,
}

impl BoardItem for Task {
    fn id(&self) -> &str {
        &self.id
    }
}

fn task(id: &str, status: &str) -> Task {
    Task {
        id: id.into(),
        status: status.into(),
    }
}

#[tokio::test]
async fn test_missing_blob_is_empty_board() {
    let temp = TempDir::new().unwrap();
    let adapter: LocalAdapter<Task> = LocalAdapter::new(FileBlobStore::new(temp.path()), "board");
    assert!(adapter.fetch_items().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_save_and_fetch_through_files() {
    let temp = TempDir::new().unwrap();
    let adapter: LocalAdapter<Task> = LocalAdapter::new(FileBlobStore::new(temp.path()), "board");
    adapter
        .save_items(&[task("a", "todo"), task("b", "done")])
        .await
        .unwrap();

    let items = adapter.fetch_items().await.unwrap();
    assert_eq!(items, vec![task("a", "todo"), task("b", "done")]);
    assert!(temp.path().join("board.json").exists());
}

#[tokio::test]
async fn test_corrupt_data_is_distinguished_but_reads_empty() {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert("board", "{not json");
    let adapter: LocalAdapter<Task> = LocalAdapter::shared(blobs, "board");

    let err = adapter.try_load().await.unwrap_err();
    assert!(matches!(err, KanbanError::CorruptData { ref key, .. } if key == "board"));
    assert!(adapter.fetch_items().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_quota_failure_is_storage_unavailable() {
    let adapter: LocalAdapter<Task> = LocalAdapter::new(MemoryBlobStore::with_quota(8), "board");

    let err = adapter
        .save_items(&[task("a", "todo"), task("b", "todo")])
        .await
        .unwrap_err();
    assert!(matches!(err, KanbanError::StorageUnavailable { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_update_item_column_keeps_unknown_fields() {
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert(
        "board",
        r#"[{"id":"a","status":"todo","points":3},{"id":"b","status":"todo"}]"#,
    );
    let adapter: LocalAdapter<Task> = LocalAdapter::shared(blobs.clone(), "board");

    adapter
        .update_item_column("a", &ColumnId::from("done"))
        .await
        .unwrap();

    let stored: Value = serde_json::from_str(&blobs.get("board").unwrap()).unwrap();
    assert_eq!(stored[0]["status"], "done");
    assert_eq!(stored[0]["points"], 3);
    assert_eq!(stored[1]["status"], "todo");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_column_updates_all_persist() {
    let temp = TempDir::new().unwrap();
    let adapter: LocalAdapter<Task> = LocalAdapter::new(FileBlobStore::new(temp.path()), "board");
    adapter
        .save_items(&[task("a", "todo"), task("b", "todo")])
        .await
        .unwrap();

    let done = ColumnId::from("done");
    let (a, b) = tokio::join!(
        adapter.update_item_column("a", &done),
        adapter.update_item_column("b", &done)
    );
    a.unwrap();
    b.unwrap();

    let items = adapter.try_load().await.unwrap();
    assert_eq!(items, vec![task("a", "done"), task("b", "done")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_spawned_updates_all_persist() {
    let temp = TempDir::new().unwrap();
    let adapter: Arc<LocalAdapter<Task>> = Arc::new(LocalAdapter::new(
        FileBlobStore::new(temp.path()),
        "board",
    ));
    let ids: Vec<String> = (0..12).map(|n| format!("t{n}")).collect();
    let items: Vec<Task> = ids.iter().map(|id| task(id, "todo")).collect();
    adapter.save_items(&items).await.unwrap();

    let updates: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let adapter = adapter.clone();
            tokio::spawn(async move { adapter.update_item_column(&id, &"doing".into()).await })
        })
        .collect();
    for update in updates {
        update.await.unwrap().unwrap();
    }

    let stored = adapter.try_load().await.unwrap();
    assert_eq!(stored.len(), 12);
    assert!(stored.iter().all(|item| item.status == "doing"));
}

#[tokio::test]
async fn test_writes_report_missing_items() {
    let adapter: LocalAdapter<Task> = LocalAdapter::new(MemoryBlobStore::new(), "board");

    let err = adapter
        .update_item_column("ghost", &ColumnId::from("done"))
        .await
        .unwrap_err();
    assert!(matches!(err, KanbanError::ItemNotFound { .. }));
    assert!(matches!(
        adapter.delete_item("ghost").await,
        Err(KanbanError::ItemNotFound { .. })
    ));
}

#[tokio::test]
async fn test_create_update_delete_reorder() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let adapter: LocalAdapter<Task> = LocalAdapter::shared(blobs, "board");

    for id in ["a", "b", "c"] {
        adapter.create_item(&task(id, "todo")).await.unwrap();
    }
    adapter.update_item(&task("b", "doing")).await.unwrap();
    adapter.delete_item("a").await.unwrap();
    adapter.create_item(&task("d", "todo")).await.unwrap();
    adapter
        .reorder_items(&ColumnId::from("todo"), &["d".to_string(), "c".to_string()])
        .await
        .unwrap();

    let items = adapter.fetch_items().await.unwrap();
    assert_eq!(
        items,
        vec![task("b", "doing"), task("d", "todo"), task("c", "todo")]
    );
}

#[tokio::test]
async fn test_store_round_trip_through_local_adapter() {
    let temp = TempDir::new().unwrap();
    let adapter: LocalAdapter<Task> = LocalAdapter::new(FileBlobStore::new(temp.path()), "board");
    adapter.save_items(&[task("a", "todo")]).await.unwrap();

    let store = KanbanStore::builder(
        vec![ColumnConfig::new("todo", "To Do"), ColumnConfig::new("done", "Done")],
        |task: &Task| ColumnId::from(task.status.as_str()),
    )
    .adapter(adapter)
    .build()
    .unwrap();

    store.fetch_items().await;
    store.move_item("a", &"todo".into(), &"done".into(), None);
    assert!(store.update_item_column("a", &"done".into()).await);

    let reloaded: LocalAdapter<Task> = LocalAdapter::new(FileBlobStore::new(temp.path()), "board");
    assert_eq!(reloaded.fetch_items().await.unwrap(), vec![task("a", "done")]);
}

//! RemoteAdapter against a mock HTTP server

use lego_kanban::{
    BoardItem, ColumnConfig, ColumnId, KanbanError, KanbanStore, PersistenceAdapter, RemoteAdapter,
    RemoteAdapterConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ticket {
    id: String,
    lane: String,
}

impl BoardItem for Ticket {
    fn id(&self) -> &str {
        &self.id
    }
}

fn adapter(server: &MockServer) -> RemoteAdapter<Ticket> {
    RemoteAdapter::new(
        RemoteAdapterConfig::new(format!("{}/tickets", server.uri()))
            .with_column_field("lane")
            .with_header("authorization", "Bearer secret")
            .with_timeout(Duration::from_secs(5)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_fetch_items_gets_collection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tickets"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "t1", "lane": "todo"},
            {"id": "t2", "lane": "done"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let items = adapter(&server).fetch_items().await.unwrap();
    assert_eq!(
        items,
        vec![
            Ticket { id: "t1".into(), lane: "todo".into() },
            Ticket { id: "t2".into(), lane: "done".into() },
        ]
    );
}

#[tokio::test]
async fn test_update_item_column_patches_field() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/tickets/t1"))
        .and(body_json(json!({"lane": "doing"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    adapter(&server)
        .update_item_column("t1", &ColumnId::from("doing"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_non_success_status_is_typed() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/tickets/t1"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let err = adapter(&server)
        .update_item_column("t1", &ColumnId::from("doing"))
        .await
        .unwrap_err();
    assert!(matches!(err, KanbanError::Http { status: 409, .. }));
    assert_eq!(err.status(), Some(409));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_create_item_returns_server_item() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tickets"))
        .and(body_json(json!({"id": "tmp", "lane": "todo"})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"id": "tmp", "lane": "triage"})),
        )
        .mount(&server)
        .await;

    let created = adapter(&server)
        .create_item(&Ticket { id: "tmp".into(), lane: "todo".into() })
        .await
        .unwrap();
    assert_eq!(created.lane, "triage");
}

#[tokio::test]
async fn test_update_delete_and_reorder_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/tickets/t1"))
        .and(body_json(json!({"id": "t1", "lane": "done"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/tickets/t2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tickets/reorder"))
        .and(body_json(json!({"lane": "done", "item_ids": ["t3", "t1"]})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server);
    adapter
        .update_item(&Ticket { id: "t1".into(), lane: "done".into() })
        .await
        .unwrap();
    adapter.delete_item("t2").await.unwrap();
    adapter
        .reorder_items(&ColumnId::from("done"), &["t3".to_string(), "t1".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tickets"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = adapter(&server).fetch_items().await.unwrap_err();
    assert!(err.is_retryable());
}

#[test_log::test(tokio::test)]
async fn test_store_rolls_back_on_http_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tickets"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": "t1", "lane": "todo"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/tickets/t1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = KanbanStore::builder(
        vec![ColumnConfig::new("todo", "To Do"), ColumnConfig::new("doing", "Doing")],
        |ticket: &Ticket| ColumnId::from(ticket.lane.as_str()),
    )
    .shared_adapter(Arc::new(adapter(&server)))
    .build()
    .unwrap();

    store.fetch_items().await;
    assert!(store.move_item("t1", &"todo".into(), &"doing".into(), None));
    assert!(!store.update_item_column("t1", &"doing".into()).await);

    assert_eq!(store.column_items(&"todo".into()).len(), 1);
    assert!(store.column_items(&"doing".into()).is_empty());
    assert!(store.error().unwrap().starts_with("HTTP 500"));
}

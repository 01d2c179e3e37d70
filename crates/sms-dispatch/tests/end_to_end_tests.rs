//! SQLite + HTTP provider tests
//!
//! Runs real dispatch cycles against an in-memory SQLite store and a
//! wiremock delivery provider.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sms_common::MessageStatus;
use sms_dispatch::{
    DispatcherConfig, HttpDeliveryClient, HttpDeliveryClientConfig, MessageDispatcher, MessageStore,
    SqliteMessageStore,
};
use sqlx::sqlite::SqlitePoolOptions;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn seeded_store() -> Arc<SqliteMessageStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteMessageStore::new(pool);
    store.init_schema().await.unwrap();
    store.seed().await.unwrap();
    Arc::new(store)
}

fn create_dispatcher(store: Arc<SqliteMessageStore>, base_url: String) -> MessageDispatcher {
    let client = HttpDeliveryClient::new(HttpDeliveryClientConfig {
        base_url,
        ..Default::default()
    })
    .unwrap();

    MessageDispatcher::new(
        store,
        Arc::new(client),
        None,
        DispatcherConfig {
            batch_size: 2,
            period: Duration::from_secs(60),
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_cycles_drain_seeded_messages_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send-message"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "message": "Accepted",
            "messageId": "provider-id"
        })))
        .expect(4)
        .mount(&server)
        .await;

    let store = seeded_store().await;
    let dispatcher = create_dispatcher(store.clone(), server.uri());

    let first = dispatcher.run_cycle().await;
    assert_eq!(first.sent, 2);

    let sent_ids: Vec<i64> = store.fetch_sent().await.unwrap().iter().map(|m| m.id).collect();
    assert_eq!(sent_ids, vec![1, 2, 3, 4]);

    let second = dispatcher.run_cycle().await;
    assert_eq!(second.sent, 2);

    let third = dispatcher.run_cycle().await;
    assert!(third.is_empty());

    let sent = store.fetch_sent().await.unwrap();
    assert_eq!(sent.len(), 6);
    assert!(sent.iter().all(|m| m.status == MessageStatus::Sent && m.sent_at.is_some()));
}

#[tokio::test]
async fn test_rejected_delivery_is_retried_next_cycle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send-message"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store = seeded_store().await;
    let dispatcher = create_dispatcher(store.clone(), server.uri());

    let first = dispatcher.run_cycle().await;
    assert_eq!(first.unconfirmed, 2);

    let unsent = store.fetch_unsent(2).await.unwrap();
    assert_eq!(unsent.iter().map(|m| m.id).collect::<Vec<_>>(), vec![2, 4]);
}

#[tokio::test]
async fn test_overlong_stored_message_becomes_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send-message"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "message": "Accepted",
            "messageId": "provider-id"
        })))
        .expect(0)
        .mount(&server)
        .await;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteMessageStore::new(pool);
    store.init_schema().await.unwrap();
    let id = store.enqueue(&"z".repeat(161), "+1").await.unwrap();
    let store = Arc::new(store);

    let dispatcher = create_dispatcher(store.clone(), server.uri());
    let report = dispatcher.run_cycle().await;

    assert_eq!(report.invalid, 1);
    assert!(store.fetch_unsent(10).await.unwrap().is_empty());
    assert!(store.fetch_sent().await.unwrap().iter().all(|m| m.id != id));
}

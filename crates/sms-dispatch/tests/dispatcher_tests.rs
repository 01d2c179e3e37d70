//! MessageDispatcher Loop Tests
//!
//! Tests for:
//! - First cycle runs immediately
//! - Periodic cycles and survival of fetch errors
//! - Pause/resume state transitions
//! - Paused dispatcher performs no cycles until resumed

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sms_common::Message;
use sms_dispatch::{
    DeliveryClient, DeliveryConfirmation, DispatchControl, DispatchError, DispatcherConfig,
    MessageDispatcher, MessageStore, Result,
};

/// Store that hands out one fresh message per fetch and counts fetches
struct CountingStore {
    fetch_calls: AtomicU32,
    fail_fetch: AtomicBool,
    sent: parking_lot::Mutex<Vec<i64>>,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            fetch_calls: AtomicU32::new(0),
            fail_fetch: AtomicBool::new(false),
            sent: parking_lot::Mutex::new(Vec::new()),
        }
    }

    fn fetch_count(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageStore for CountingStore {
    async fn fetch_unsent(&self, _limit: u32) -> Result<Vec<Message>> {
        let n = self.fetch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(DispatchError::Store("connection refused".to_string()));
        }
        Ok(vec![Message::unsent(n as i64, "Hello", "+905551111111")])
    }

    async fn mark_sent(&self, id: i64, _sent_at: DateTime<Utc>) -> Result<()> {
        self.sent.lock().push(id);
        Ok(())
    }

    async fn mark_invalid(&self, _id: i64) -> Result<()> {
        Ok(())
    }

    async fn fetch_sent(&self) -> Result<Vec<Message>> {
        Ok(Vec::new())
    }
}

struct AcceptingClient {
    call_count: AtomicU32,
}

#[async_trait]
impl DeliveryClient for AcceptingClient {
    async fn send(&self, _content: &str, _recipient: &str) -> Result<Option<DeliveryConfirmation>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(Some(DeliveryConfirmation {
            message: "Accepted".to_string(),
            message_id: "dummy-message-id".to_string(),
        }))
    }
}

fn create_dispatcher(store: Arc<CountingStore>, period: Duration) -> (Arc<MessageDispatcher>, Arc<AcceptingClient>) {
    let client = Arc::new(AcceptingClient {
        call_count: AtomicU32::new(0),
    });
    let dispatcher = MessageDispatcher::new(
        store,
        client.clone(),
        None,
        DispatcherConfig {
            batch_size: 1,
            period,
        },
    )
    .unwrap();
    (Arc::new(dispatcher), client)
}

/// Let the spawned loop run, advancing the paused clock by `by`
async fn advance(by: Duration) {
    tokio::time::sleep(by).await;
}

#[tokio::test]
async fn test_rejects_invalid_config() {
    let store = Arc::new(CountingStore::new());
    let client = Arc::new(AcceptingClient {
        call_count: AtomicU32::new(0),
    });

    let result = MessageDispatcher::new(
        store,
        client,
        None,
        DispatcherConfig {
            batch_size: 0,
            period: Duration::from_secs(1),
        },
    );
    assert!(matches!(result, Err(DispatchError::Config(_))));
}

#[tokio::test(start_paused = true)]
async fn test_first_cycle_runs_without_waiting_a_period() {
    let store = Arc::new(CountingStore::new());
    let (dispatcher, client) = create_dispatcher(store.clone(), Duration::from_secs(3600));

    let handle = dispatcher.clone().start();

    advance(Duration::from_millis(1)).await;
    assert_eq!(store.fetch_count(), 1);
    assert_eq!(client.call_count.load(Ordering::SeqCst), 1);
    assert_eq!(store.sent.lock().clone(), vec![1]);

    // Nothing more until the hour-long period elapses
    advance(Duration::from_secs(3598)).await;
    assert_eq!(store.fetch_count(), 1);

    advance(Duration::from_secs(2)).await;
    assert_eq!(store.fetch_count(), 2);

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn test_cycles_repeat_on_period() {
    let store = Arc::new(CountingStore::new());
    let (dispatcher, _client) = create_dispatcher(store.clone(), Duration::from_millis(50));

    let handle = dispatcher.start();

    // Cycles start at 0, 50, 100 and 150ms
    advance(Duration::from_millis(160)).await;
    assert_eq!(store.fetch_count(), 4);
    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn test_loop_survives_fetch_errors() {
    let store = Arc::new(CountingStore::new());
    store.fail_fetch.store(true, Ordering::SeqCst);
    let (dispatcher, client) = create_dispatcher(store.clone(), Duration::from_millis(30));

    let handle = dispatcher.start();

    advance(Duration::from_millis(100)).await;
    assert_eq!(store.fetch_count(), 4);
    assert!(!handle.is_finished());
    assert_eq!(client.call_count.load(Ordering::SeqCst), 0);
    handle.abort();
}

#[tokio::test]
async fn test_pause_then_resume_flips_state() {
    let store = Arc::new(CountingStore::new());
    let (dispatcher, _client) = create_dispatcher(store, Duration::from_secs(60));

    assert!(!dispatcher.is_paused());
    dispatcher.pause();
    assert!(dispatcher.is_paused());
    dispatcher.resume();
    assert!(!dispatcher.is_paused());
}

#[tokio::test]
async fn test_control_trait_is_idempotent() {
    let store = Arc::new(CountingStore::new());
    let (dispatcher, _client) = create_dispatcher(store, Duration::from_secs(60));
    let control: Arc<dyn DispatchControl> = dispatcher;

    assert!(control.pause());
    assert!(!control.pause());
    assert!(control.is_paused());
    assert!(control.resume());
    assert!(!control.resume());
    assert!(!control.is_paused());
}

#[tokio::test(start_paused = true)]
async fn test_paused_dispatcher_runs_no_cycles_until_resumed() {
    let store = Arc::new(CountingStore::new());
    let period = Duration::from_millis(50);
    let (dispatcher, _client) = create_dispatcher(store.clone(), period);

    dispatcher.pause();
    let handle = dispatcher.clone().start();

    advance(Duration::from_secs(600)).await;
    assert_eq!(store.fetch_count(), 0);

    // One cycle straight away, the next a full period later
    dispatcher.resume();
    advance(Duration::from_millis(1)).await;
    assert_eq!(store.fetch_count(), 1);

    advance(period - Duration::from_millis(10)).await;
    assert_eq!(store.fetch_count(), 1);

    advance(Duration::from_millis(20)).await;
    assert_eq!(store.fetch_count(), 2);

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn test_pause_during_run_stops_subsequent_cycles() {
    let store = Arc::new(CountingStore::new());
    let (dispatcher, _client) = create_dispatcher(store.clone(), Duration::from_millis(40));

    let handle = dispatcher.clone().start();

    // Cycles at 0 and 40ms
    advance(Duration::from_millis(50)).await;
    assert_eq!(store.fetch_count(), 2);

    dispatcher.pause();
    advance(Duration::from_secs(60)).await;
    assert_eq!(store.fetch_count(), 2);

    dispatcher.resume();
    advance(Duration::from_millis(1)).await;
    assert_eq!(store.fetch_count(), 3);

    handle.abort();
}

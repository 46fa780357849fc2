#![cfg(test)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::test;

use crate::event::{EventBus, EventOptions, ListenerOutcome, StandardEvent, sync_listener};
use crate::kernel::constants::EVENT_BUS_SERVICE;

use super::common::default_harness;

#[test]
async fn test_bus_is_shared_through_registry() {
    let h = default_harness().await;
    let from_registry = h.kernel.get_service::<EventBus>(EVENT_BUS_SERVICE).unwrap();
    assert!(Arc::ptr_eq(&from_registry, &h.bus));

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    from_registry
        .subscribe(
            "bookmark:added",
            sync_listener(move |_envelope| {
                hits_clone.fetch_add(1, Ordering::SeqCst);
                Ok(ListenerOutcome::Continue)
            }),
            EventOptions::new(),
        )
        .unwrap();

    h.bus
        .emit(StandardEvent::BookmarkAdded, json!({"article": 1}))
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
async fn test_wait_for_system_ready() {
    let h = default_harness().await;
    let bus = Arc::clone(&h.bus);
    let waiter = tokio::spawn(async move { bus.wait_for("system:ready", Duration::from_secs(5)).await });

    // Give the waiter a chance to subscribe.
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.kernel.start().await.unwrap();

    let data = waiter.await.unwrap().unwrap();
    assert_eq!(data["modules"], json!(["storage"]));
    assert_eq!(h.bus.listener_count(Some("system:ready")), 0);
}

#[test]
async fn test_storage_mutations_publish_data_changed() {
    let h = default_harness().await;
    h.kernel.start().await.unwrap();

    let bus = Arc::clone(&h.bus);
    let waiter = tokio::spawn(async move { bus.wait_for("storage:data_changed", Duration::from_secs(5)).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    use crate::storage::{Collection, StorageBackend};
    let mut feed = serde_json::Map::new();
    feed.insert("url".to_string(), json!("https://example.org/feed.xml"));
    let id = h.storage.insert(Collection::Feeds, feed).await.unwrap();

    let change = waiter.await.unwrap().unwrap();
    assert_eq!(change, json!({"collection": "feeds", "action": "insert", "id": id}));
}

#[test]
async fn test_listener_errors_reach_error_channel() {
    let h = default_harness().await;
    let errors = Arc::new(AtomicUsize::new(0));
    let errors_clone = Arc::clone(&errors);
    h.bus
        .subscribe(
            StandardEvent::ListenerError.name(),
            sync_listener(move |envelope| {
                assert_eq!(envelope.data()["eventName"], json!("system:ready"));
                errors_clone.fetch_add(1, Ordering::SeqCst);
                Ok(ListenerOutcome::Continue)
            }),
            EventOptions::new(),
        )
        .unwrap();
    h.bus
        .subscribe(
            "system:ready",
            sync_listener(|_envelope| Err("ui not mounted".into())),
            EventOptions::new(),
        )
        .unwrap();

    h.kernel.start().await.expect("listener failure must not fail start");
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

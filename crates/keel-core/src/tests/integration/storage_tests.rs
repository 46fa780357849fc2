#![cfg(test)]

use std::sync::Arc;

use serde_json::json;
use tokio::test;

use crate::event::StandardEvent;
use crate::kernel::constants::STORAGE_SERVICE;
use crate::kernel::error::Error;
use crate::storage::{Collection, MemoryStorage, StorageBackend, StorageError};

use super::common::{ReadTrackerModule, default_harness, record_events};

fn record(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
async fn test_storage_service_follows_module_lifecycle() {
    let h = default_harness().await;
    let storage = h.kernel.get_service::<MemoryStorage>(STORAGE_SERVICE).unwrap();
    assert!(Arc::ptr_eq(&storage, &h.storage));

    assert!(matches!(
        storage.insert(Collection::Feeds, record(json!({"url": "a"}))).await,
        Err(Error::Storage(StorageError::NotConnected { .. }))
    ));

    h.kernel.start().await.unwrap();
    let id = storage
        .insert(Collection::Feeds, record(json!({"url": "https://example.org/rss"})))
        .await
        .unwrap();
    assert_eq!(storage.count(Collection::Feeds).await.unwrap(), 1);

    h.kernel.stop().await;
    assert!(matches!(
        storage.get(Collection::Feeds, id).await,
        Err(Error::Storage(StorageError::NotConnected { .. }))
    ));

    // Records survive a restart of the same backend.
    h.kernel.start().await.unwrap();
    let feed = storage.get(Collection::Feeds, id).await.unwrap().unwrap();
    assert_eq!(feed["url"], json!("https://example.org/rss"));
    h.kernel.stop().await;
}

#[test]
async fn test_module_writes_through_events() {
    let h = default_harness().await;
    h.kernel
        .load_module(
            "read-tracker",
            Arc::new(ReadTrackerModule::new(Arc::clone(&h.bus), h.storage.clone())),
        )
        .await
        .unwrap();
    let changes = record_events(&h.bus, &["storage:data_changed"]);

    h.kernel.start().await.unwrap();
    h.bus.emit(StandardEvent::ArticleRead, json!({"id": 7})).await.unwrap();
    h.bus.emit(StandardEvent::ArticleRead, json!({"id": 9})).await.unwrap();

    let progress = h.storage.list(Collection::ReadingProgress).await.unwrap();
    let articles: Vec<_> = progress.iter().map(|r| r["article"].clone()).collect();
    assert_eq!(articles, vec![json!(7), json!(9)]);
    assert_eq!(changes.lock().unwrap().len(), 2);

    // Deactivated modules stop writing.
    h.kernel.deactivate_module("read-tracker").await.unwrap();
    h.bus.emit(StandardEvent::ArticleRead, json!({"id": 11})).await.unwrap();
    assert_eq!(h.storage.count(Collection::ReadingProgress).await.unwrap(), 2);

    h.kernel.stop().await;
}

#[test]
async fn test_export_from_one_kernel_import_into_another() {
    let source = default_harness().await;
    source.kernel.start().await.unwrap();
    source
        .storage
        .insert(Collection::Bookmarks, record(json!({"article": 3})))
        .await
        .unwrap();
    source
        .storage
        .insert(Collection::SearchHistory, record(json!({"query": "rust"})))
        .await
        .unwrap();
    let export = source.storage.export_data().await.unwrap();
    source.kernel.stop().await;

    let target = default_harness().await;
    target.kernel.start().await.unwrap();
    target.storage.import_data(export).await.unwrap();

    let stats = target.storage.statistics().await.unwrap();
    assert!(stats.connected);
    assert_eq!(stats.backend, "memory");
    assert_eq!(stats.total_records, 2);
    assert_eq!(stats.counts[&Collection::Bookmarks], 1);
    assert_eq!(stats.counts[&Collection::SearchHistory], 1);
    assert_eq!(stats.counts[&Collection::Feeds], 0);

    target.kernel.stop().await;
    let stats = target.storage.statistics().await.unwrap();
    assert!(!stats.connected);
    assert_eq!(stats.total_records, 2);
}

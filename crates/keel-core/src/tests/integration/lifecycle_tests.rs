#![cfg(test)]

use std::sync::Arc;

use serde_json::json;
use tokio::test;

use crate::config::ConfigData;
use crate::kernel::bootstrap::{Kernel, KernelState};
use crate::kernel::error::Error;
use crate::module_system::ModuleSystemError;
use crate::module_system::Module;
use crate::storage::{Collection, MemoryStorage, StorageBackend, StorageModule};

use super::common::{ReadTrackerModule, TracingModule, default_harness, entries, harness, record_events, timeline};

#[test]
async fn test_full_lifecycle_with_storage() {
    let h = default_harness().await;
    let log = timeline();
    h.kernel
        .load_module("ui", Arc::new(TracingModule::new("ui", &["storage"], &log)))
        .await
        .unwrap();

    let seen = record_events(
        &h.bus,
        &["system:ready", "storage:connected", "storage:disconnected", "system:shutdown"],
    );

    h.kernel.start().await.unwrap();
    assert!(h.storage.is_connected());
    assert!(h.kernel.is_module_active("ui"));

    h.kernel.stop().await;
    assert!(!h.storage.is_connected());
    assert_eq!(h.kernel.state(), KernelState::Stopped);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "storage:connected",
            "system:ready",
            "storage:disconnected",
            "system:shutdown"
        ]
    );
}

#[test]
async fn test_three_module_chain() {
    let h = default_harness().await;
    let log = timeline();
    for (name, deps) in [("c", vec!["b"]), ("b", vec!["a"]), ("a", vec![])] {
        h.kernel
            .load_module(name, Arc::new(TracingModule::new(name, &deps, &log)))
            .await
            .unwrap();
    }

    h.kernel.start().await.unwrap();
    assert_eq!(entries(&log, "activate"), vec!["a", "b", "c"]);
    h.kernel.stop().await;
    assert_eq!(entries(&log, "deactivate"), vec!["c", "b", "a"]);
}

#[test]
async fn test_storage_dependency_activates_first() {
    let h = default_harness().await;
    let tracker = Arc::new(ReadTrackerModule::new(h.bus.clone(), h.storage.clone()));
    // Loaded after storage but sorted by dependency anyway.
    h.kernel.load_module("read-tracker", tracker).await.unwrap();

    assert_eq!(h.kernel.sorted_modules().unwrap(), vec!["storage", "read-tracker"]);
    h.kernel.start().await.unwrap();

    h.bus
        .publish("article:read", json!({"id": 7}), Default::default())
        .await
        .unwrap();
    let progress = h
        .storage
        .list(Collection::ReadingProgress)
        .await
        .unwrap();
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0]["article"], json!(7));

    h.kernel.stop().await;
    assert_eq!(h.bus.listener_count(Some("article:read")), 0);
}

#[test]
async fn test_module_config_comes_from_kernel_config() {
    let h = harness(json!({ "modules": { "ui": { "theme": "dark" } } })).await;
    let log = timeline();
    let ui = Arc::new(TracingModule::new("ui", &[], &log));
    h.kernel.load_module("ui", ui.clone()).await.unwrap();

    assert_eq!(ui.config().get::<String>("theme"), Some("dark".to_string()));

    let update = ConfigData::from_value(json!({ "theme": "light" })).unwrap();
    h.kernel.update_module_config("ui", update.clone()).await.unwrap();
    assert_eq!(ui.config(), update);
    assert_eq!(h.kernel.module_config("ui"), Some(update));
}

#[test]
async fn test_unsupported_storage_type_rejects_module() {
    let kernel = Kernel::new();
    kernel
        .init(ConfigData::from_value(json!({ "modules": { "storage": { "type": "sqlite" } } })).unwrap())
        .await
        .unwrap();

    let err = kernel
        .load_module("storage", Arc::new(StorageModule::new(Arc::new(MemoryStorage::new()))))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Unsupported storage type: sqlite"));
    assert_eq!(kernel.module_count(), 0);
}

#[test]
async fn test_failed_start_then_stop_cleans_up() {
    let h = default_harness().await;
    let log = timeline();
    h.kernel
        .load_module("broken", Arc::new(TracingModule::new("broken", &["storage"], &log).failing_activation()))
        .await
        .unwrap();

    let err = h.kernel.start().await.unwrap_err();
    assert!(matches!(err, Error::ModuleLifecycle { .. }));
    assert!(h.storage.is_connected(), "storage was activated before the failure");
    assert!(h.kernel.is_running());

    h.kernel.stop().await;
    assert!(!h.storage.is_connected());
}

#[test]
async fn test_unload_and_reload() {
    let h = default_harness().await;
    let log = timeline();
    h.kernel
        .load_module("ui", Arc::new(TracingModule::new("ui", &[], &log)))
        .await
        .unwrap();
    h.kernel.start().await.unwrap();

    h.kernel.unload_module("ui").await.unwrap();
    assert_eq!(entries(&log, "destroy"), vec!["ui"]);
    assert_eq!(h.kernel.module_names(), vec!["storage"]);

    h.kernel
        .load_module("ui", Arc::new(TracingModule::new("ui", &[], &log)))
        .await
        .unwrap();
    assert!(!h.kernel.is_module_active("ui"));
    h.kernel.activate_module("ui").await.unwrap();
    assert!(h.kernel.is_module_active("ui"));

    assert!(matches!(
        h.kernel.unload_module("ghost").await,
        Err(Error::ModuleSystem(ModuleSystemError::ModuleNotFound { .. }))
    ));
}

#[test]
async fn test_status_reports_services_and_modules() {
    let h = default_harness().await;
    h.kernel.start().await.unwrap();

    let status = serde_json::to_value(h.kernel.status()).unwrap();
    assert_eq!(status["kernel"]["initialized"], json!(true));
    assert_eq!(status["kernel"]["running"], json!(true));
    assert_eq!(status["kernel"]["modules"][0]["name"], json!("storage"));
    assert_eq!(status["services"], json!(["eventBus", "storage"]));
}

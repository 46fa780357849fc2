#![cfg(test)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::ConfigData;
use crate::event::{EventBus, EventOptions, ListenerOutcome, StandardEvent, SubscriptionId, sync_listener};
use crate::kernel::bootstrap::Kernel;
use crate::kernel::constants::{EVENT_BUS_SERVICE, STORAGE_SERVICE};
use crate::kernel::error::{Error, LifecyclePhase, Result as KernelResult};
use crate::module_system::Module;
use crate::storage::{Collection, MemoryStorage, StorageBackend, StorageModule};

// ===== MOCK MODULES =====

/// Shared record of lifecycle calls across modules, as "<hook>:<module>".
pub type Timeline = Arc<Mutex<Vec<String>>>;

pub fn timeline() -> Timeline {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(timeline: &Timeline, hook: &str) -> Vec<String> {
    let prefix = format!("{}:", hook);
    timeline
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
        .collect()
}

/// A module that only records its lifecycle.
pub struct TracingModule {
    name: String,
    deps: Vec<String>,
    timeline: Timeline,
    fail_activate: bool,
    config: Mutex<ConfigData>,
}

impl TracingModule {
    pub fn new(name: &str, deps: &[&str], timeline: &Timeline) -> Self {
        Self {
            name: name.to_string(),
            deps: deps.iter().map(|d| d.to_string()).collect(),
            timeline: Arc::clone(timeline),
            fail_activate: false,
            config: Mutex::new(ConfigData::new()),
        }
    }

    pub fn failing_activation(mut self) -> Self {
        self.fail_activate = true;
        self
    }

    fn push(&self, hook: &str) {
        self.timeline.lock().unwrap().push(format!("{}:{}", hook, self.name));
    }
}

#[async_trait]
impl Module for TracingModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn dependencies(&self) -> Vec<String> {
        self.deps.clone()
    }

    async fn init(&self, config: ConfigData) -> KernelResult<()> {
        *self.config.lock().unwrap() = config;
        self.push("init");
        Ok(())
    }

    async fn activate(&self) -> KernelResult<()> {
        self.push("activate");
        if self.fail_activate {
            return Err(Error::lifecycle(self.name.clone(), LifecyclePhase::Activate, "simulated failure"));
        }
        Ok(())
    }

    async fn deactivate(&self) -> KernelResult<()> {
        self.push("deactivate");
        Ok(())
    }

    async fn destroy(&self) -> KernelResult<()> {
        self.push("destroy");
        Ok(())
    }

    fn config(&self) -> ConfigData {
        self.config.lock().unwrap().clone()
    }

    async fn update_config(&self, config: ConfigData) -> KernelResult<()> {
        *self.config.lock().unwrap() = config;
        self.push("update");
        Ok(())
    }
}

/// A module that depends on storage and writes a record on every
/// `article:read` it sees while active.
pub struct ReadTrackerModule {
    bus: Arc<EventBus>,
    storage: Arc<dyn StorageBackend>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl ReadTrackerModule {
    pub fn new(bus: Arc<EventBus>, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            bus,
            storage,
            subscription: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Module for ReadTrackerModule {
    fn name(&self) -> &str {
        "read-tracker"
    }

    fn version(&self) -> &str {
        "0.2.0"
    }

    fn dependencies(&self) -> Vec<String> {
        vec![STORAGE_SERVICE.to_string()]
    }

    async fn init(&self, _config: ConfigData) -> KernelResult<()> {
        Ok(())
    }

    async fn activate(&self) -> KernelResult<()> {
        let storage = Arc::clone(&self.storage);
        let id = self.bus.subscribe(
            StandardEvent::ArticleRead.name(),
            crate::event::listener(move |envelope| {
                let storage = Arc::clone(&storage);
                async move {
                    let mut record = serde_json::Map::new();
                    record.insert("article".to_string(), envelope.data()["id"].clone());
                    storage.insert(Collection::ReadingProgress, record).await?;
                    Ok(ListenerOutcome::Continue)
                }
            }),
            EventOptions::new(),
        )?;
        *self.subscription.lock().unwrap() = Some(id);
        Ok(())
    }

    async fn deactivate(&self) -> KernelResult<()> {
        if let Some(id) = self.subscription.lock().unwrap().take() {
            self.bus.unsubscribe(&id);
        }
        Ok(())
    }

    async fn destroy(&self) -> KernelResult<()> {
        Ok(())
    }

    async fn update_config(&self, _config: ConfigData) -> KernelResult<()> {
        Ok(())
    }
}

// ===== FIXTURES =====

/// Kernel wired the way the host wires it: bus and storage registered as
/// services, storage loaded as a module.
pub struct Harness {
    pub kernel: Arc<Kernel>,
    pub bus: Arc<EventBus>,
    pub storage: Arc<MemoryStorage>,
}

pub async fn harness(config: Value) -> Harness {
    let bus = Arc::new(EventBus::new());
    let storage = Arc::new(MemoryStorage::with_event_bus(Arc::clone(&bus)));
    let kernel = Arc::new(Kernel::new());
    kernel.register_service(EVENT_BUS_SERVICE, Arc::clone(&bus));
    kernel.register_service(STORAGE_SERVICE, Arc::clone(&storage));

    kernel
        .init(ConfigData::from_value(config).expect("config must be an object"))
        .await
        .expect("kernel init");
    kernel
        .load_module(STORAGE_SERVICE, Arc::new(StorageModule::new(storage.clone())))
        .await
        .expect("load storage module");

    Harness { kernel, bus, storage }
}

pub async fn default_harness() -> Harness {
    harness(json!({})).await
}

/// Collect the event names delivered for `names` in arrival order.
pub fn record_events(bus: &EventBus, names: &[&str]) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for name in names {
        let seen = Arc::clone(&seen);
        bus.subscribe(
            name,
            sync_listener(move |envelope| {
                seen.lock().unwrap().push(envelope.name().to_string());
                Ok(ListenerOutcome::Continue)
            }),
            EventOptions::new(),
        )
        .expect("subscribe");
    }
    seen
}

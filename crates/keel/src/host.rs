use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use keel_core::config::ConfigData;
use keel_core::event::{EventBus, EventOptions, ListenerOutcome, StandardEvent, SubscriptionId, sync_listener};
use keel_core::kernel::constants::{SERVICES_CONFIG_KEY, STORAGE_SERVICE};
use keel_core::kernel::{Kernel, Result};
use keel_core::module_system::Module;
use keel_core::storage::{StorageBackend, StorageModule, create_backend};

pub const EVENT_LOG_MODULE: &str = "event-log";

/// Everything the host builds at boot, owned by `main`.
pub struct Host {
    pub kernel: Arc<Kernel>,
    pub bus: Arc<EventBus>,
    pub storage: Arc<dyn StorageBackend>,
}

/// Build the bus, kernel, storage service and default modules, then `init`.
pub async fn boot(config: ConfigData) -> Result<Host> {
    let bus = Arc::new(EventBus::new());
    let kernel = Arc::new(Kernel::with_event_bus(Arc::clone(&bus)));
    kernel.init(config).await?;

    let storage_type = kernel
        .config()
        .section(SERVICES_CONFIG_KEY)
        .section(STORAGE_SERVICE)
        .get::<String>("type")
        .unwrap_or_else(|| "memory".to_string());
    let storage = create_backend(&storage_type, Some(Arc::clone(&bus)))?;
    kernel.register_service(STORAGE_SERVICE, Arc::new(Arc::clone(&storage)));
    log::info!("Storage service '{}' registered ({})", STORAGE_SERVICE, storage_type);

    kernel
        .load_module(STORAGE_SERVICE, Arc::new(StorageModule::new(Arc::clone(&storage))))
        .await?;
    kernel
        .load_module(EVENT_LOG_MODULE, Arc::new(EventLogModule::new(Arc::clone(&bus))))
        .await?;
    Ok(Host { kernel, bus, storage })
}

/// Logs every standard event while active. Events listed under
/// `modules.event-log.ignore` are skipped.
pub struct EventLogModule {
    bus: Arc<EventBus>,
    ignored: Mutex<HashSet<String>>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    config: Mutex<ConfigData>,
}

impl EventLogModule {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            ignored: Mutex::new(HashSet::new()),
            subscriptions: Mutex::new(Vec::new()),
            config: Mutex::new(ConfigData::new()),
        }
    }

    fn apply_config(&self, config: ConfigData) {
        let ignored: HashSet<String> = config.get::<Vec<String>>("ignore").unwrap_or_default().into_iter().collect();
        *self.ignored.lock().unwrap_or_else(PoisonError::into_inner) = ignored;
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config;
    }
}

#[async_trait]
impl Module for EventLogModule {
    fn name(&self) -> &str {
        EVENT_LOG_MODULE
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn dependencies(&self) -> Vec<String> {
        vec![STORAGE_SERVICE.to_string()]
    }

    async fn init(&self, config: ConfigData) -> Result<()> {
        self.apply_config(config);
        Ok(())
    }

    async fn activate(&self) -> Result<()> {
        let ignored = self.ignored.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let mut ids = Vec::new();
        for event in StandardEvent::ALL {
            if ignored.contains(event.name()) {
                continue;
            }
            let id = self.bus.subscribe(
                event.name(),
                sync_listener(|envelope| {
                    log::info!("[event] {} {}", envelope.name(), envelope.data());
                    Ok(ListenerOutcome::Continue)
                }),
                EventOptions::new(),
            )?;
            ids.push(id);
        }
        log::debug!("Event log listening on {} event(s)", ids.len());
        *self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner) = ids;
        Ok(())
    }

    async fn deactivate(&self) -> Result<()> {
        let ids = std::mem::take(&mut *self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner));
        for id in &ids {
            self.bus.unsubscribe(id);
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.deactivate().await
    }

    fn config(&self) -> ConfigData {
        self.config.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn update_config(&self, config: ConfigData) -> Result<()> {
        self.apply_config(config);
        Ok(())
    }
}

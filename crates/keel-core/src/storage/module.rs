use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::config::ConfigData;
use crate::kernel::error::{Error, LifecyclePhase, Result};
use crate::module_system::Module;
use crate::storage::provider::StorageBackend;

pub const STORAGE_MODULE_NAME: &str = "storage";

/// Adapts a [`StorageBackend`] to the module lifecycle: the backend is
/// connected while the module is active.
#[derive(Debug)]
pub struct StorageModule {
    backend: Arc<dyn StorageBackend>,
    config: Mutex<ConfigData>,
}

impl StorageModule {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            config: Mutex::new(ConfigData::new()),
        }
    }

    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.backend)
    }

    fn check_type(&self, config: &ConfigData, phase: LifecyclePhase) -> Result<()> {
        match config.get::<String>("type") {
            Some(requested) if requested != self.backend.backend_type() => Err(Error::lifecycle(
                STORAGE_MODULE_NAME,
                phase,
                format!(
                    "Unsupported storage type: {} (backend is '{}')",
                    requested,
                    self.backend.backend_type()
                ),
            )),
            _ => Ok(()),
        }
    }

    fn store_config(&self, config: ConfigData) {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config;
    }
}

#[async_trait]
impl Module for StorageModule {
    fn name(&self) -> &str {
        STORAGE_MODULE_NAME
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    async fn init(&self, config: ConfigData) -> Result<()> {
        self.check_type(&config, LifecyclePhase::Init)?;
        self.store_config(config);
        Ok(())
    }

    async fn activate(&self) -> Result<()> {
        self.backend.connect().await
    }

    async fn deactivate(&self) -> Result<()> {
        self.backend.disconnect().await
    }

    async fn destroy(&self) -> Result<()> {
        if self.backend.is_connected() {
            self.backend.disconnect().await?;
        }
        Ok(())
    }

    fn config(&self) -> ConfigData {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn update_config(&self, config: ConfigData) -> Result<()> {
        self.check_type(&config, LifecyclePhase::ConfigUpdate)?;
        self.store_config(config);
        Ok(())
    }
}

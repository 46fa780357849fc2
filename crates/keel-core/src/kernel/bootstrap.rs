use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::Mutex as TransitionLock;

tokio::task_local! {
    /// Address of the kernel whose transition is being driven by the current future.
    static TRANSITION_OWNER: usize;
}

use crate::config::{ConfigData, kernel_defaults};
use crate::event::{EventBus, StandardEvent};
use crate::kernel::constants::{self, EVENT_BUS_SERVICE, MODULES_CONFIG_KEY};
use crate::kernel::error::{Error, Result};
use crate::kernel::registry::{ServiceRegistry, SharedService};
use crate::module_system::dependency::sort_by_dependencies;
use crate::module_system::registry::{ModuleRecord, ModuleTable, validate_module};
use crate::module_system::{Module, ModuleSystemError};

/// Lifecycle state of the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
}

impl fmt::Display for KernelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            KernelState::Uninitialized => "uninitialized",
            KernelState::Initialized => "initialized",
            KernelState::Running => "running",
            KernelState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Per-module entry in [`SystemStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleStatus {
    pub name: String,
    pub version: String,
    pub active: bool,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelStatus {
    pub initialized: bool,
    pub running: bool,
    pub state: KernelState,
    pub modules: Vec<ModuleStatus>,
}

/// Serializable snapshot of the kernel and its registered services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStatus {
    pub kernel: KernelStatus,
    pub services: Vec<String>,
}

/// Module lifecycle manager.
///
/// Owns the module table and the service registry, orders activation by
/// declared dependencies and announces `system:*` milestones on the
/// [`EventBus`] registered under `"eventBus"`, if any.
///
/// Every operation that runs module hooks holds an async transition lock for
/// its whole duration, so hooks never interleave. Concurrent callers wait
/// for the lock; a nested call made from inside a running transition returns
/// [`Error::TransitionInProgress`]. The table locks themselves are only held
/// between suspension points.
pub struct Kernel {
    state: Mutex<KernelState>,
    config: RwLock<ConfigData>,
    modules: Mutex<ModuleTable>,
    services: RwLock<ServiceRegistry>,
    transitions: TransitionLock<()>,
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("state", &self.state())
            .field("modules", &self.module_names())
            .field("services", &self.service_names())
            .finish()
    }
}

impl Kernel {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(KernelState::Uninitialized),
            config: RwLock::new(ConfigData::new()),
            modules: Mutex::new(ModuleTable::new()),
            services: RwLock::new(ServiceRegistry::new()),
            transitions: TransitionLock::new(()),
        }
    }

    /// Kernel with `bus` already registered under `"eventBus"`.
    pub fn with_event_bus(bus: Arc<EventBus>) -> Self {
        let kernel = Self::new();
        kernel.register_service(EVENT_BUS_SERVICE, bus);
        kernel
    }

    fn lock_state(&self) -> MutexGuard<'_, KernelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_modules(&self) -> MutexGuard<'_, ModuleTable> {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_services(&self) -> RwLockReadGuard<'_, ServiceRegistry> {
        self.services.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_services(&self) -> RwLockWriteGuard<'_, ServiceRegistry> {
        self.services.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: KernelState) {
        *self.lock_state() = state;
    }

    // --- Lifecycle ---

    /// Run `op` while holding the transition lock.
    ///
    /// `op` runs with this kernel marked as the owner, so a nested call made
    /// from inside it (a hook, or a listener the hook published to) fails fast
    /// instead of waiting on the lock it already holds.
    async fn transition<T, F>(&self, operation: &'static str, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.in_transition() {
            return Err(Error::TransitionInProgress { operation });
        }
        let _guard = self.transitions.lock().await;
        TRANSITION_OWNER.scope(self.identity(), op).await
    }

    fn identity(&self) -> usize {
        self as *const Self as usize
    }

    fn in_transition(&self) -> bool {
        TRANSITION_OWNER
            .try_with(|owner| *owner == self.identity())
            .unwrap_or(false)
    }

    /// Merge `config` over the defaults and move to `Initialized`.
    pub async fn init(&self, config: ConfigData) -> Result<()> {
        self.transition("init", async {
            if self.state() != KernelState::Uninitialized {
                return Err(Error::AlreadyInitialized);
            }
            let mut merged = kernel_defaults();
            merged.merge(&config);
            *self.config.write().unwrap_or_else(PoisonError::into_inner) = merged;
            self.set_state(KernelState::Initialized);
            Ok(())
        })
        .await?;

        log::info!("{} kernel v{} initialized", constants::APP_NAME, constants::APP_VERSION);
        self.announce(
            StandardEvent::SystemInit,
            json!({ "version": constants::APP_VERSION }),
        )
        .await;
        Ok(())
    }

    /// Activate every loaded module in dependency order.
    ///
    /// Fails with `CyclicDependency` before any module is touched if the loaded
    /// modules cannot be ordered. The kernel counts as running as soon as
    /// activation begins. If a module fails to activate the error is returned
    /// and the modules activated before it stay active; call
    /// [`stop`](Self::stop) to wind them down.
    pub async fn start(&self) -> Result<()> {
        let order = self
            .transition("start", async {
                match self.state() {
                    KernelState::Uninitialized => return Err(Error::NotInitialized),
                    KernelState::Running => return Err(Error::AlreadyRunning),
                    KernelState::Initialized | KernelState::Stopped => {}
                }
                let order = self.sorted_modules()?;
                self.set_state(KernelState::Running);
                log::info!("Starting kernel");

                for name in &order {
                    if let Err(e) = self.activate_locked(name).await {
                        log::error!("Failed to activate module '{}': {}", name, e);
                        return Err(e);
                    }
                }
                Ok(order)
            })
            .await?;

        log::info!("Kernel started with {} module(s)", order.len());
        self.announce(StandardEvent::SystemReady, json!({ "modules": order }))
            .await;
        Ok(())
    }

    /// Deactivate every module in reverse dependency order.
    ///
    /// No-op unless running. Individual deactivation failures are logged and
    /// skipped so that shutdown always completes. Called from inside another
    /// lifecycle operation it logs the error and does nothing.
    pub async fn stop(&self) {
        let stopped = self
            .transition("stop", async {
                if self.state() != KernelState::Running {
                    log::debug!("stop() ignored: kernel is {}", self.state());
                    return Ok(false);
                }
                self.set_state(KernelState::Stopped);
                log::info!("Stopping kernel");

                let mut order = self.sorted_modules().unwrap_or_else(|e| {
                    log::error!("{}; deactivating in reverse load order", e);
                    self.module_names()
                });
                order.reverse();
                for name in &order {
                    if let Err(e) = self.deactivate_locked(name).await {
                        log::error!("Failed to deactivate module '{}': {}", name, e);
                    }
                }
                Ok(true)
            })
            .await;

        match stopped {
            Ok(true) => {
                log::info!("Kernel stopped");
                self.announce(StandardEvent::SystemShutdown, json!({})).await;
            }
            Ok(false) => {}
            Err(e) => log::error!("stop() refused: {}", e),
        }
    }

    // --- Modules ---

    /// Validate, initialize and register a module.
    ///
    /// `init` receives `config.modules.<name>`. A module whose `init` fails is
    /// not retained.
    pub async fn load_module(&self, name: &str, module: Arc<dyn Module>) -> Result<()> {
        self.transition("load_module", async {
            validate_module(name, module.as_ref())?;
            if self.lock_modules().contains(name) {
                return Err(ModuleSystemError::DuplicateModule {
                    name: name.to_string(),
                }
                .into());
            }

            let module_config = self.config_for(name);
            if let Err(e) = module.init(module_config.clone()).await {
                log::error!("Module '{}' failed to initialize: {}", name, e);
                return Err(e);
            }

            self.lock_modules()
                .insert(name, ModuleRecord::new(module, module_config))?;
            log::info!("Module loaded: {}", name);
            Ok(())
        })
        .await
    }

    /// Deactivate (if active), destroy and remove a module.
    pub async fn unload_module(&self, name: &str) -> Result<()> {
        self.transition("unload_module", async {
            let instance = self.lock_modules().require(name)?.instance.clone();

            self.deactivate_locked(name).await?;
            instance.destroy().await?;
            self.lock_modules().remove(name);
            log::info!("Module unloaded: {}", name);
            Ok(())
        })
        .await
    }

    /// Activate one module. No-op if it is already active.
    pub async fn activate_module(&self, name: &str) -> Result<()> {
        self.transition("activate_module", self.activate_locked(name))
            .await
    }

    /// Deactivate one module. No-op if it is not active.
    pub async fn deactivate_module(&self, name: &str) -> Result<()> {
        self.transition("deactivate_module", self.deactivate_locked(name))
            .await
    }

    async fn activate_locked(&self, name: &str) -> Result<()> {
        let instance = {
            let modules = self.lock_modules();
            let record = modules.require(name)?;
            if record.is_active {
                return Ok(());
            }
            record.instance.clone()
        };
        instance.activate().await?;
        self.lock_modules().set_active(name, true);
        log::info!("Module activated: {}", name);
        Ok(())
    }

    async fn deactivate_locked(&self, name: &str) -> Result<()> {
        let instance = {
            let modules = self.lock_modules();
            let record = modules.require(name)?;
            if !record.is_active {
                return Ok(());
            }
            record.instance.clone()
        };
        instance.deactivate().await?;
        self.lock_modules().set_active(name, false);
        log::info!("Module deactivated: {}", name);
        Ok(())
    }

    /// Hand a new configuration to a module and record it.
    pub async fn update_module_config(&self, name: &str, config: ConfigData) -> Result<()> {
        self.transition("update_module_config", async {
            let instance = self.lock_modules().require(name)?.instance.clone();
            instance.update_config(config.clone()).await?;
            if let Some(record) = self.lock_modules().get_mut(name) {
                record.config = config;
            }
            log::info!("Module config updated: {}", name);
            Ok(())
        })
        .await
    }

    /// Loaded modules ordered so that dependencies come first.
    pub fn sorted_modules(&self) -> Result<Vec<String>> {
        let modules = self.lock_modules();
        let order = sort_by_dependencies(&modules.names(), &modules.dependency_map())?;
        Ok(order)
    }

    /// Loaded module names in load order.
    pub fn module_names(&self) -> Vec<String> {
        self.lock_modules().names()
    }

    pub fn is_module_active(&self, name: &str) -> bool {
        self.lock_modules().is_active(name)
    }

    pub fn module_count(&self) -> usize {
        self.lock_modules().len()
    }

    /// Configuration stored on the module's record.
    pub fn module_config(&self, name: &str) -> Option<ConfigData> {
        self.lock_modules().get(name).map(|record| record.config.clone())
    }

    pub fn module(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.lock_modules()
            .get(name)
            .map(|record| record.instance.clone())
    }

    fn config_for(&self, name: &str) -> ConfigData {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .section(MODULES_CONFIG_KEY)
            .section(name)
    }

    // --- Services ---

    /// Register or replace a shared service.
    pub fn register_service<T: Any + Send + Sync>(&self, name: &str, service: Arc<T>) {
        self.write_services().register(name, service);
    }

    pub fn register_service_any(&self, name: &str, service: SharedService) {
        self.write_services().register_any(name, service);
    }

    /// The exact `Arc` registered under `name`.
    pub fn get_service<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.read_services().get::<T>(name)
    }

    pub fn get_service_any(&self, name: &str) -> Result<SharedService> {
        self.read_services().get_any(name)
    }

    pub fn has_service(&self, name: &str) -> bool {
        self.read_services().contains(name)
    }

    pub fn service_names(&self) -> Vec<String> {
        self.read_services().names()
    }

    /// The bus registered under `"eventBus"`, if it is an [`EventBus`].
    pub fn event_bus(&self) -> Option<Arc<EventBus>> {
        self.read_services().get::<EventBus>(EVENT_BUS_SERVICE).ok()
    }

    async fn announce(&self, event: StandardEvent, data: Value) {
        let Some(bus) = self.event_bus() else {
            return;
        };
        if let Err(e) = bus.emit(event, data).await {
            log::warn!("Failed to announce '{}': {}", event, e);
        }
    }

    // --- Introspection ---

    /// Effective configuration (defaults merged with the `init` argument).
    pub fn config(&self) -> ConfigData {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> KernelState {
        *self.lock_state()
    }

    pub fn is_initialized(&self) -> bool {
        self.state() != KernelState::Uninitialized
    }

    pub fn is_running(&self) -> bool {
        self.state() == KernelState::Running
    }

    pub fn status(&self) -> SystemStatus {
        let state = self.state();
        let modules = {
            let table = self.lock_modules();
            table
                .names()
                .iter()
                .filter_map(|name| {
                    table.get(name).map(|record| ModuleStatus {
                        name: name.clone(),
                        version: record.instance.version().to_string(),
                        active: record.is_active,
                        dependencies: record.instance.dependencies(),
                    })
                })
                .collect()
        };
        SystemStatus {
            kernel: KernelStatus {
                initialized: state != KernelState::Uninitialized,
                running: state == KernelState::Running,
                state,
                modules,
            },
            services: self.service_names(),
        }
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

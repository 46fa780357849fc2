//! # Keel Core Kernel
//!
//! The `kernel` module is the orchestrator of the `keel-core` host. It owns
//! the loaded modules and the shared services and drives modules through
//! their lifecycle in dependency order.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Lifecycle State Machine**: [`Kernel`](bootstrap::Kernel) moves through
//!   `uninitialized -> initialized -> running -> stopped`, activating modules
//!   dependencies-first on `start` and deactivating them in reverse on `stop`.
//! - **Service Registry**: [`ServiceRegistry`](registry::ServiceRegistry) maps
//!   names to shared `Arc` singletons; the event bus lives there as `"eventBus"`.
//! - **Core Constants**: well-known service names and config keys in `constants`.
//! - **Error Handling**: the crate-wide [`Error`](error::Error) and `Result` alias.
pub mod bootstrap;
pub mod constants;
pub mod error;
pub mod registry;

pub use bootstrap::{Kernel, KernelState, KernelStatus, ModuleStatus, SystemStatus};
pub use error::{Error, LifecyclePhase, Result};
pub use registry::{ServiceRegistry, SharedService};

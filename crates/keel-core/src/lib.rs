//! # keel-core
//!
//! Module lifecycle kernel for the Keel application host.
//!
//! A [`Kernel`] owns a set of [`Module`]s and a name-keyed service registry,
//! activates modules in dependency order and announces lifecycle milestones on
//! an [`EventBus`]. Modules and services talk to each other through named
//! events rather than direct references.
pub mod config;
pub mod event;
pub mod kernel;
pub mod module_system;
pub mod storage;

// Re-export key public types/traits for easier use by the binary and modules
pub use config::ConfigData;
pub use event::{EventBus, EventEnvelope, ListenerOutcome, StandardEvent, SubscriptionId};
pub use kernel::error::Error as KernelError;
pub use kernel::{Kernel, KernelState, SystemStatus};
pub use module_system::Module;
pub use storage::{MemoryStorage, StorageBackend, StorageModule};

#[cfg(test)]
mod tests;

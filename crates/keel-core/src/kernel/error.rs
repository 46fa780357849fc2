//! # Keel Core Kernel Errors
//!
//! Defines error types specific to the Keel Kernel.
//!
//! This module includes [`Error`], the primary enum encompassing the errors
//! that can occur while driving the kernel state machine, looking up
//! services, or running module lifecycle hooks. Subsystem errors (event bus,
//! module table, configuration, storage) are wrapped through `#[from]`
//! conversions so `?` works across module boundaries.
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::config::error::ConfigError;
use crate::event::error::EventSystemError;
use crate::module_system::error::ModuleSystemError;
use crate::storage::error::StorageError;

/// Error type shared by the kernel, the bus and every module.
#[derive(Debug, ThisError)]
pub enum Error {
    /// `Kernel::init` was called a second time.
    #[error("Kernel already initialized")]
    AlreadyInitialized,

    /// A lifecycle operation that needs `init` ran before it.
    #[error("Kernel not initialized")]
    NotInitialized,

    /// `Kernel::start` was called while the kernel is running.
    #[error("Kernel already running")]
    AlreadyRunning,

    /// A lifecycle operation was called from inside another one on the same
    /// task, e.g. from a module hook or a listener it triggered.
    #[error("Kernel lifecycle transition already in progress: {operation}")]
    TransitionInProgress { operation: &'static str },

    /// Registry lookup miss.
    #[error("Service not found: {name}")]
    ServiceNotFound { name: String },

    /// The service exists but holds a different concrete type.
    #[error("Service '{name}' is not of the requested type {expected}")]
    ServiceTypeMismatch {
        name: String,
        expected: &'static str,
    },

    /// Error reported by a module while running one of its lifecycle hooks.
    #[error("Module '{module}' failed during {phase}: {message}")]
    ModuleLifecycle {
        module: String,
        phase: LifecyclePhase,
        message: String,
    },

    /// Event system error
    #[error("Event system error: {0}")]
    EventSystem(#[from] EventSystemError),

    /// Module table or dependency ordering error
    #[error("Module system error: {0}")]
    ModuleSystem(#[from] ModuleSystemError),

    /// Configuration loading or conversion error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Storage collaborator error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase in a module's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum LifecyclePhase {
    #[error("init")]
    Init,
    #[error("activate")]
    Activate,
    #[error("deactivate")]
    Deactivate,
    #[error("destroy")]
    Destroy,
    #[error("config update")]
    ConfigUpdate,
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl Error {
    /// Convenience constructor for module implementations reporting a failed hook.
    pub fn lifecycle(module: impl Into<String>, phase: LifecyclePhase, message: impl Into<String>) -> Self {
        Error::ModuleLifecycle {
            module: module.into(),
            phase,
            message: message.into(),
        }
    }

    /// Returns true for the kernel state-machine violations.
    pub fn is_state_violation(&self) -> bool {
        matches!(
            self,
            Error::AlreadyInitialized | Error::NotInitialized | Error::AlreadyRunning
        )
    }
}

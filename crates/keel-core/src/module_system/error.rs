//! # Keel Core Module System Errors
//!
//! [`ModuleSystemError`] covers violations of the kernel's module table
//! (duplicate or unknown names, modules that fail validation) and dependency
//! graphs that cannot be ordered.
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModuleSystemError {
    #[error("Module '{name}' is already loaded")]
    DuplicateModule { name: String },

    #[error("Module '{name}' not found")]
    ModuleNotFound { name: String },

    #[error("Invalid module '{name}': {reason}")]
    InvalidModule { name: String, reason: String },

    #[error("Cyclic module dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },
}

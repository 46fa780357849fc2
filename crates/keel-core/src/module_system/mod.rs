//! # Keel Core Module System
//!
//! The contract every pluggable unit implements and the bookkeeping the
//! kernel keeps about loaded units.
//!
//! - [`traits`]: the [`Module`] trait.
//! - [`registry`]: [`ModuleRecord`] and the insertion-ordered [`ModuleTable`].
//! - [`dependency`]: dependency-respecting activation order with cycle detection.
//! - [`error`]: [`ModuleSystemError`].
pub mod dependency;
pub mod error;
pub mod registry;
pub mod traits;

pub use dependency::sort_by_dependencies;
pub use error::ModuleSystemError;
pub use registry::{ModuleRecord, ModuleTable};
pub use traits::Module;

//! # Keel Core Storage Contract
//!
//! The async record interface that services persist through, not a
//! persistence engine. [`StorageBackend`] describes the calls,
//! [`MemoryStorage`] is the in-memory backend the host and tests use, and
//! [`StorageModule`] puts a backend under kernel lifecycle control.
pub mod error;
pub mod memory;
pub mod module;
pub mod provider;

/// Re-export key types
pub use error::StorageError;
pub use memory::{MemoryStorage, create_backend};
pub use module::{STORAGE_MODULE_NAME, StorageModule};
pub use provider::{Collection, DataExport, Record, RecordId, StorageBackend, StorageStatistics};

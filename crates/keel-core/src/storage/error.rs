//! # Keel Core Storage Errors
//!
//! Defines error types for the storage collaborator contract.
//!
//! [`StorageError`] is what a [`StorageBackend`](crate::storage::StorageBackend)
//! reports: calls made while disconnected, lookups of unknown records,
//! malformed records, unknown backend types, and failures inside the backend
//! itself.
use thiserror::Error;

use crate::storage::provider::Collection;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage backend '{backend}' is not connected")]
    NotConnected { backend: String },

    #[error("Record {id} not found in collection '{collection}'")]
    RecordNotFound { collection: Collection, id: u64 },

    #[error("Invalid record for collection '{collection}': {reason}")]
    InvalidRecord { collection: Collection, reason: String },

    #[error("Unsupported storage type: {backend_type}")]
    UnsupportedBackend { backend_type: String },

    #[error("Storage backend '{backend}' failed during '{operation}': {message}")]
    Backend {
        backend: String,
        operation: String,
        message: String,
    },
}

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::kernel::error::Result;

/// Identifier assigned by a backend on insert.
pub type RecordId = u64;

/// A stored record: a JSON object. Backends keep its id under `"id"`.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Record collections the reader's services persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Feeds,
    Articles,
    Categories,
    Bookmarks,
    Preferences,
    SearchHistory,
    ReadingProgress,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Feeds,
        Collection::Articles,
        Collection::Categories,
        Collection::Bookmarks,
        Collection::Preferences,
        Collection::SearchHistory,
        Collection::ReadingProgress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Feeds => "feeds",
            Collection::Articles => "articles",
            Collection::Categories => "categories",
            Collection::Bookmarks => "bookmarks",
            Collection::Preferences => "preferences",
            Collection::SearchHistory => "search_history",
            Collection::ReadingProgress => "reading_progress",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full dump of a backend, used for backup and restore.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataExport {
    pub version: String,
    /// Milliseconds since the Unix epoch.
    pub exported_at: i64,
    pub collections: BTreeMap<Collection, Vec<Record>>,
}

/// Per-collection record counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatistics {
    pub backend: String,
    pub connected: bool,
    pub counts: BTreeMap<Collection, usize>,
    pub total_records: usize,
}

/// Async record interface that storage backends expose to services.
///
/// Every data call fails with `StorageError::NotConnected` before `connect`
/// or after `disconnect`.
#[async_trait]
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Backend type name as it appears in configuration (e.g. `"memory"`).
    fn backend_type(&self) -> &str;

    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Store a new record and return the id assigned to it.
    async fn insert(&self, collection: Collection, record: Record) -> Result<RecordId>;

    async fn get(&self, collection: Collection, id: RecordId) -> Result<Option<Record>>;

    /// Shallow-merge `changes` into an existing record and return the result.
    async fn update(&self, collection: Collection, id: RecordId, changes: Record) -> Result<Record>;

    /// Returns whether a record was removed.
    async fn delete(&self, collection: Collection, id: RecordId) -> Result<bool>;

    /// All records of a collection in id order.
    async fn list(&self, collection: Collection) -> Result<Vec<Record>>;

    async fn count(&self, collection: Collection) -> Result<usize>;

    async fn export_data(&self) -> Result<DataExport>;

    /// Replace the contents of every collection present in `data`.
    async fn import_data(&self, data: DataExport) -> Result<()>;

    async fn statistics(&self) -> Result<StorageStatistics>;
}

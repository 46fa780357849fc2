use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::event::{EventBus, StandardEvent};
use crate::kernel::constants::APP_VERSION;
use crate::kernel::error::Result;
use crate::storage::error::StorageError;
use crate::storage::provider::{Collection, DataExport, Record, RecordId, StorageBackend, StorageStatistics};

const BACKEND_TYPE: &str = "memory";

#[derive(Default)]
struct MemoryState {
    collections: HashMap<Collection, BTreeMap<RecordId, Record>>,
    next_id: RecordId,
}

impl MemoryState {
    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }
}

/// Volatile storage backend holding every collection in memory.
///
/// When built with an event bus it announces connection changes and every
/// mutation (`storage:data_changed` with `{collection, action, id}`).
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
    connected: AtomicBool,
    bus: Option<Arc<EventBus>>,
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .field("has_event_bus", &self.bus.is_some())
            .finish()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            connected: AtomicBool::new(false),
            bus: None,
        }
    }

    pub fn with_event_bus(bus: Arc<EventBus>) -> Self {
        Self {
            bus: Some(bus),
            ..Self::new()
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StorageError::NotConnected {
                backend: BACKEND_TYPE.to_string(),
            }
            .into())
        }
    }

    async fn announce(&self, event: StandardEvent, data: Value) {
        if let Some(bus) = &self.bus {
            if let Err(e) = bus.emit(event, data).await {
                log::warn!("Failed to publish '{}': {}", event, e);
            }
        }
    }

    async fn announce_change(&self, collection: Collection, action: &str, id: Option<RecordId>) {
        self.announce(
            StandardEvent::StorageDataChanged,
            json!({ "collection": collection, "action": action, "id": id }),
        )
        .await;
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn record_id(collection: Collection, record: &Record) -> Result<RecordId> {
    record
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| {
            StorageError::InvalidRecord {
                collection,
                reason: "imported record has no numeric 'id'".to_string(),
            }
            .into()
        })
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn backend_type(&self) -> &str {
        BACKEND_TYPE
    }

    async fn connect(&self) -> Result<()> {
        if self.connected.swap(true, Ordering::SeqCst) {
            log::debug!("Memory storage already connected");
            return Ok(());
        }
        log::info!("Memory storage connected");
        self.announce(StandardEvent::StorageConnected, json!({ "type": BACKEND_TYPE }))
            .await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        log::info!("Memory storage disconnected");
        self.announce(StandardEvent::StorageDisconnected, json!({ "type": BACKEND_TYPE }))
            .await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn insert(&self, collection: Collection, mut record: Record) -> Result<RecordId> {
        self.ensure_connected()?;
        let id = {
            let mut state = self.state.write().await;
            let id = state.allocate_id();
            record.insert("id".to_string(), json!(id));
            state.collections.entry(collection).or_default().insert(id, record);
            id
        };
        log::debug!("Inserted record {} into '{}'", id, collection);
        self.announce_change(collection, "insert", Some(id)).await;
        Ok(id)
    }

    async fn get(&self, collection: Collection, id: RecordId) -> Result<Option<Record>> {
        self.ensure_connected()?;
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(&collection)
            .and_then(|records| records.get(&id))
            .cloned())
    }

    async fn update(&self, collection: Collection, id: RecordId, changes: Record) -> Result<Record> {
        self.ensure_connected()?;
        if changes.get("id").is_some_and(|v| v.as_u64() != Some(id)) {
            return Err(StorageError::InvalidRecord {
                collection,
                reason: "the 'id' field cannot be changed".to_string(),
            }
            .into());
        }
        let updated = {
            let mut state = self.state.write().await;
            let record = state
                .collections
                .get_mut(&collection)
                .and_then(|records| records.get_mut(&id))
                .ok_or(StorageError::RecordNotFound { collection, id })?;
            for (key, value) in changes {
                record.insert(key, value);
            }
            record.clone()
        };
        self.announce_change(collection, "update", Some(id)).await;
        Ok(updated)
    }

    async fn delete(&self, collection: Collection, id: RecordId) -> Result<bool> {
        self.ensure_connected()?;
        let removed = {
            let mut state = self.state.write().await;
            let removed = state
                .collections
                .get_mut(&collection)
                .and_then(|records| records.remove(&id))
                .is_some();
            if state.collections.get(&collection).is_some_and(BTreeMap::is_empty) {
                state.collections.remove(&collection);
            }
            removed
        };
        if removed {
            self.announce_change(collection, "delete", Some(id)).await;
        }
        Ok(removed)
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Record>> {
        self.ensure_connected()?;
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(&collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, collection: Collection) -> Result<usize> {
        self.ensure_connected()?;
        let state = self.state.read().await;
        Ok(state.collections.get(&collection).map_or(0, BTreeMap::len))
    }

    async fn export_data(&self) -> Result<DataExport> {
        self.ensure_connected()?;
        let state = self.state.read().await;
        let collections = state
            .collections
            .iter()
            .map(|(collection, records)| (*collection, records.values().cloned().collect()))
            .collect();
        Ok(DataExport {
            version: APP_VERSION.to_string(),
            exported_at: now_millis(),
            collections,
        })
    }

    async fn import_data(&self, data: DataExport) -> Result<()> {
        self.ensure_connected()?;

        // Validate everything before touching the live state.
        let mut staged = Vec::with_capacity(data.collections.len());
        for (collection, records) in data.collections {
            let mut by_id = BTreeMap::new();
            for record in records {
                by_id.insert(record_id(collection, &record)?, record);
            }
            staged.push((collection, by_id));
        }

        let imported: Vec<Collection> = {
            let mut state = self.state.write().await;
            let mut imported = Vec::with_capacity(staged.len());
            for (collection, records) in staged {
                if let Some(max_id) = records.keys().next_back() {
                    state.next_id = state.next_id.max(*max_id);
                }
                if records.is_empty() {
                    state.collections.remove(&collection);
                } else {
                    state.collections.insert(collection, records);
                }
                imported.push(collection);
            }
            imported
        };

        log::info!("Imported {} collection(s) into memory storage", imported.len());
        for collection in imported {
            self.announce_change(collection, "import", None).await;
        }
        Ok(())
    }

    async fn statistics(&self) -> Result<StorageStatistics> {
        let state = self.state.read().await;
        let counts: BTreeMap<Collection, usize> = Collection::ALL
            .iter()
            .map(|c| (*c, state.collections.get(c).map_or(0, BTreeMap::len)))
            .collect();
        Ok(StorageStatistics {
            backend: BACKEND_TYPE.to_string(),
            connected: self.is_connected(),
            total_records: counts.values().sum(),
            counts,
        })
    }
}

/// Build the backend named by `services.storage.type`.
pub fn create_backend(backend_type: &str, bus: Option<Arc<EventBus>>) -> Result<Arc<dyn StorageBackend>> {
    match backend_type {
        BACKEND_TYPE => Ok(Arc::new(match bus {
            Some(bus) => MemoryStorage::with_event_bus(bus),
            None => MemoryStorage::new(),
        })),
        other => Err(StorageError::UnsupportedBackend {
            backend_type: other.to_string(),
        }
        .into()),
    }
}

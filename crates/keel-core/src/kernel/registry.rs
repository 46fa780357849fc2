use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::kernel::error::{Error, Result};

/// Type-erased shared service handle.
pub type SharedService = Arc<dyn Any + Send + Sync>;

/// Name-keyed store of shared singleton services.
///
/// Services are stored as `Arc<dyn Any + Send + Sync>` and handed back as the
/// very same `Arc` (pointer-equal) for as long as they stay registered.
/// Registering under an existing name overwrites the previous entry.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<String, SharedService>,
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish()
    }
}

impl ServiceRegistry {
    /// Create a new empty service registry
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Register a typed service. Returns true when an existing entry was replaced.
    pub fn register<T>(&mut self, name: &str, service: Arc<T>) -> bool
    where
        T: Any + Send + Sync,
    {
        self.register_any(name, service)
    }

    /// Register an already type-erased service.
    pub fn register_any(&mut self, name: &str, service: SharedService) -> bool {
        let replaced = self.services.insert(name.to_string(), service).is_some();
        if replaced {
            log::warn!("Service '{}' replaced by a new registration", name);
        } else {
            log::info!("Service registered: {}", name);
        }
        replaced
    }

    /// Get a service by name, downcast to its concrete type.
    pub fn get<T>(&self, name: &str) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let service = self.get_any(name)?;
        Arc::downcast::<T>(service).map_err(|_| Error::ServiceTypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
    }

    /// Get a service by name without downcasting.
    pub fn get_any(&self, name: &str) -> Result<SharedService> {
        self.services
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ServiceNotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a service, returning it if it was present.
    pub fn remove(&mut self, name: &str) -> Option<SharedService> {
        self.services.remove(name)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Clear all services.
    pub fn clear(&mut self) {
        self.services.clear();
    }
}

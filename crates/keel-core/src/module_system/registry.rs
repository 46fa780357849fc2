use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::ConfigData;
use crate::module_system::error::ModuleSystemError;
use crate::module_system::traits::Module;

/// Kernel-side bookkeeping for one loaded module.
#[derive(Clone)]
pub struct ModuleRecord {
    pub instance: Arc<dyn Module>,
    /// `activate` completed and `deactivate` has not completed since.
    pub is_active: bool,
    pub config: ConfigData,
}

impl ModuleRecord {
    pub fn new(instance: Arc<dyn Module>, config: ConfigData) -> Self {
        Self {
            instance,
            is_active: false,
            config,
        }
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("name", &self.instance.name())
            .field("version", &self.instance.version())
            .field("is_active", &self.is_active)
            .field("config", &self.config)
            .finish()
    }
}

/// Loaded modules keyed by registration name, remembering load order.
#[derive(Debug, Default)]
pub struct ModuleTable {
    records: HashMap<String, ModuleRecord>,
    order: Vec<String>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, failing if the name is taken.
    pub fn insert(&mut self, name: &str, record: ModuleRecord) -> Result<(), ModuleSystemError> {
        if self.records.contains_key(name) {
            return Err(ModuleSystemError::DuplicateModule {
                name: name.to_string(),
            });
        }
        self.records.insert(name.to_string(), record);
        self.order.push(name.to_string());
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<ModuleRecord> {
        let record = self.records.remove(name)?;
        self.order.retain(|n| n != name);
        Some(record)
    }

    pub fn get(&self, name: &str) -> Option<&ModuleRecord> {
        self.records.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ModuleRecord> {
        self.records.get_mut(name)
    }

    /// Record lookup that reports a miss as `ModuleNotFound`.
    pub fn require(&self, name: &str) -> Result<&ModuleRecord, ModuleSystemError> {
        self.records
            .get(name)
            .ok_or_else(|| ModuleSystemError::ModuleNotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Names in load order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Flip the active flag; returns false if the module is unknown.
    pub fn set_active(&mut self, name: &str, active: bool) -> bool {
        match self.records.get_mut(name) {
            Some(record) => {
                record.is_active = active;
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.records.get(name).is_some_and(|r| r.is_active)
    }

    /// Declared dependencies of every loaded module, keyed by name.
    pub fn dependency_map(&self) -> HashMap<String, Vec<String>> {
        self.records
            .iter()
            .map(|(name, record)| (name.clone(), record.instance.dependencies()))
            .collect()
    }
}

/// Check a module against the contract before it is accepted.
pub fn validate_module(name: &str, module: &dyn Module) -> Result<(), ModuleSystemError> {
    let invalid = |reason: String| ModuleSystemError::InvalidModule {
        name: name.to_string(),
        reason,
    };

    if name.trim().is_empty() {
        return Err(invalid("registration name is empty".to_string()));
    }
    if module.name().trim().is_empty() {
        return Err(invalid("module reports an empty name".to_string()));
    }
    if let Err(e) = semver::Version::parse(module.version()) {
        log::warn!(
            "Module '{}' reports version '{}', which is not a semantic version: {}",
            name,
            module.version(),
            e
        );
    }
    if module.dependencies().iter().any(|dep| dep == name) {
        return Err(invalid("module depends on itself".to_string()));
    }
    Ok(())
}

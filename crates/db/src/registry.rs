//! Named instance registry
//!
//! Maps names to shared [`QuickDb`] handles. A [`Registry`] can be owned
//! and passed around explicitly; the free functions use one lazily created
//! process-wide registry.

use qkv_core::{KvError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::info;

use crate::facade::{QuickDb, QuickDbOptions};

#[derive(Debug, Default)]
pub struct Registry {
    instances: Mutex<HashMap<String, Arc<QuickDb>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // Inserts and removals are single map operations, so a poisoned map is still consistent
    fn instances(&self) -> MutexGuard<'_, HashMap<String, Arc<QuickDb>>> {
        self.instances
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Build a handle and store it under `name`, replacing any previous one.
    pub fn register_singleton(&self, name: &str, options: QuickDbOptions) -> Result<Arc<QuickDb>> {
        if name.is_empty() {
            return Err(KvError::MissingKey("first argument (name) is required".to_string()));
        }

        let instance = Arc::new(QuickDb::new(options)?);
        let replaced = self
            .instances()
            .insert(name.to_string(), Arc::clone(&instance))
            .is_some();
        info!(
            "Registered singleton instance {} (table {}, replaced: {})",
            name,
            instance.table_name(),
            replaced
        );
        Ok(instance)
    }

    pub fn get_singleton(&self, name: &str) -> Result<Arc<QuickDb>> {
        self.instances()
            .get(name)
            .cloned()
            .ok_or_else(|| KvError::InstanceNotFound(name.to_string()))
    }

    pub fn remove(&self, name: &str) -> Option<Arc<QuickDb>> {
        self.instances().remove(name)
    }

    /// Drop every registered handle, returning how many there were
    pub fn clear(&self) -> usize {
        let mut instances = self.instances();
        let count = instances.len();
        instances.clear();
        count
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.instances().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances().is_empty()
    }
}

/// The process-wide registry
pub fn global() -> &'static Registry {
    static GLOBAL: OnceLock<Registry> = OnceLock::new();
    GLOBAL.get_or_init(Registry::new)
}

pub fn register_singleton(name: &str, options: QuickDbOptions) -> Result<Arc<QuickDb>> {
    global().register_singleton(name, options)
}

pub fn get_singleton(name: &str) -> Result<Arc<QuickDb>> {
    global().get_singleton(name)
}

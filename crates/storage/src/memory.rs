//! In-memory driver
//!
//! Tables are insertion-ordered maps created on first access. The file
//! store keeps its working set here and snapshots it after each write.

use async_trait::async_trait;
use linked_hash_map::LinkedHashMap;
use qkv_core::{KvError, Result, Row};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::trait_::{Driver, SharedDriver};

type Table = LinkedHashMap<String, Value>;

#[derive(Default)]
pub struct MemoryDriver {
    tables: Mutex<LinkedHashMap<String, Table>>,
}

impl std::fmt::Debug for MemoryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.lock().map(|t| t.len()).unwrap_or_default();
        f.debug_struct("MemoryDriver").field("tables", &tables).finish()
    }
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LinkedHashMap<String, Table>>> {
        self.tables.lock().map_err(|e| KvError::Driver(e.to_string()))
    }

    /// Run `f` against `table`, creating it first if needed.
    fn with_table<T>(&self, table: &str, f: impl FnOnce(&mut Table) -> T) -> Result<T> {
        let mut tables = self.lock()?;
        if !tables.contains_key(table) {
            tables.insert(table.to_string(), Table::new());
        }
        match tables.get_mut(table) {
            Some(rows) => Ok(f(rows)),
            None => Err(KvError::Driver(format!("table {} vanished", table))),
        }
    }

    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        self.with_table(table, |rows| {
            rows.iter()
                .map(|(id, value)| Row::new(id.clone(), value.clone()))
                .collect()
        })
    }

    pub fn rows_starting_with(&self, table: &str, prefix: &str) -> Result<Vec<Row>> {
        self.with_table(table, |rows| {
            rows.iter()
                .filter(|(id, _)| id.starts_with(prefix))
                .map(|(id, value)| Row::new(id.clone(), value.clone()))
                .collect()
        })
    }

    pub fn lookup(&self, table: &str, key: &str) -> Result<(Option<Value>, bool)> {
        self.with_table(table, |rows| match rows.get(key) {
            Some(value) => (Some(value.clone()), true),
            None => (None, false),
        })
    }

    /// Overwrite in place or append; existing rows keep their position.
    pub fn put(&self, table: &str, key: &str, value: Value) -> Result<Value> {
        self.with_table(table, |rows| {
            if let Some(slot) = rows.get_mut(key) {
                *slot = value.clone();
            } else {
                rows.insert(key.to_string(), value.clone());
            }
            value
        })
    }

    pub fn remove(&self, table: &str, key: &str) -> Result<u64> {
        self.with_table(table, |rows| u64::from(rows.remove(key).is_some()))
    }

    pub fn clear(&self, table: &str) -> Result<u64> {
        self.with_table(table, |rows| {
            let count = rows.len() as u64;
            rows.clear();
            count
        })
    }

    /// Names of every table created so far, in creation order
    pub fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    /// Full copy of every table, taken under a single lock
    pub fn export(&self) -> Result<Vec<(String, Vec<Row>)>> {
        let tables = self.lock()?;
        Ok(tables
            .iter()
            .map(|(name, rows)| {
                let rows = rows
                    .iter()
                    .map(|(id, value)| Row::new(id.clone(), value.clone()))
                    .collect();
                (name.clone(), rows)
            })
            .collect())
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn prepare(&self, table: &str) -> Result<()> {
        self.with_table(table, |_| ())
    }

    async fn get_all_rows(&self, table: &str) -> Result<Vec<Row>> {
        self.rows(table)
    }

    async fn get_starts_with(&self, table: &str, prefix: &str) -> Result<Vec<Row>> {
        self.rows_starting_with(table, prefix)
    }

    async fn get_row_by_key(&self, table: &str, key: &str) -> Result<(Option<Value>, bool)> {
        self.lookup(table, key)
    }

    async fn set_row_by_key(
        &self,
        table: &str,
        key: &str,
        value: Value,
        _existed: bool,
    ) -> Result<Value> {
        self.put(table, key, value)
    }

    async fn delete_row_by_key(&self, table: &str, key: &str) -> Result<u64> {
        self.remove(table, key)
    }

    async fn delete_all_rows(&self, table: &str) -> Result<u64> {
        self.clear(table)
    }
}

/// Create a new shared in-memory driver
pub fn create_memory_driver() -> SharedDriver {
    Arc::new(MemoryDriver::new())
}

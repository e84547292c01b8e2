//! JSON file driver
//!
//! Serves every operation from a [`MemoryDriver`] and, after each write,
//! atomically replaces the backing file with a snapshot of all tables:
//!
//! ```json
//! {"json": [{"id": "user", "value": {"name": "ana"}}], "other": []}
//! ```

use async_trait::async_trait;
use qkv_core::{KvError, Result, Row};
use qkv_storage::{Driver, MemoryDriver};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::atomic;

/// JSON snapshot driver
#[derive(Debug)]
pub struct JsonDriver {
    /// Snapshot file
    path: PathBuf,

    /// Working set
    memory: MemoryDriver,
}

impl JsonDriver {
    /// Open the snapshot at `path`, creating an empty one if it is missing.
    ///
    /// Loading is synchronous. An unparsable file is reported as corrupt
    /// instead of being replaced.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let memory = MemoryDriver::new();

        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            replay(&memory, parse_document(&path, &contents)?)?;
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            atomic::write_atomic_sync(&path, b"{}")?;
        }

        info!(
            "JSON store opened at {:?} with {} tables",
            path,
            memory.table_names()?.len()
        );
        Ok(Self { path, memory })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the snapshot file into the working set.
    ///
    /// Rows from the file overwrite rows with the same id; rows that only
    /// exist in memory are kept.
    pub async fn reload(&self) -> Result<()> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => replay(&self.memory, parse_document(&self.path, &contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                atomic::write_atomic(&self.path, b"{}").await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The document written by [`snapshot`](Self::snapshot)
    pub fn export(&self) -> Result<Map<String, Value>> {
        let mut document = Map::new();
        for (table, rows) in self.memory.export()? {
            document.insert(table, serde_json::to_value(rows)?);
        }
        Ok(document)
    }

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.export()?)?)
    }

    /// Atomically replace the backing file with every table's rows.
    ///
    /// Concurrent snapshots are not queued; the last rename wins.
    pub async fn snapshot(&self) -> Result<()> {
        let contents = self.encode()?;
        atomic::write_atomic(&self.path, &contents).await?;
        debug!("Snapshot of {} bytes written to {:?}", contents.len(), self.path);
        Ok(())
    }
}

fn parse_document(path: &Path, contents: &str) -> Result<Vec<(String, Vec<Row>)>> {
    let corrupt = |e: serde_json::Error| KvError::Parse(format!("{:?}: {}", path, e));

    let document: Map<String, Value> = serde_json::from_str(contents).map_err(corrupt)?;
    document
        .into_iter()
        .map(|(table, rows)| -> Result<(String, Vec<Row>)> {
            Ok((table, serde_json::from_value(rows).map_err(corrupt)?))
        })
        .collect()
}

fn replay(memory: &MemoryDriver, tables: Vec<(String, Vec<Row>)>) -> Result<()> {
    for (table, rows) in tables {
        // empty tables still need to exist after a reload
        memory.rows(&table)?;
        for row in rows {
            memory.put(&table, &row.id, row.value)?;
        }
    }
    Ok(())
}

#[async_trait]
impl Driver for JsonDriver {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn prepare(&self, table: &str) -> Result<()> {
        self.memory.prepare(table).await
    }

    async fn get_all_rows(&self, table: &str) -> Result<Vec<Row>> {
        self.memory.get_all_rows(table).await
    }

    async fn get_starts_with(&self, table: &str, prefix: &str) -> Result<Vec<Row>> {
        self.memory.get_starts_with(table, prefix).await
    }

    async fn get_row_by_key(&self, table: &str, key: &str) -> Result<(Option<Value>, bool)> {
        self.memory.get_row_by_key(table, key).await
    }

    async fn set_row_by_key(
        &self,
        table: &str,
        key: &str,
        value: Value,
        existed: bool,
    ) -> Result<Value> {
        let stored = self.memory.set_row_by_key(table, key, value, existed).await?;
        self.snapshot().await?;
        Ok(stored)
    }

    async fn delete_row_by_key(&self, table: &str, key: &str) -> Result<u64> {
        let removed = self.memory.delete_row_by_key(table, key).await?;
        self.snapshot().await?;
        Ok(removed)
    }

    async fn delete_all_rows(&self, table: &str) -> Result<u64> {
        let removed = self.memory.delete_all_rows(table).await?;
        self.snapshot().await?;
        Ok(removed)
    }
}

/// Open a JSON store at `path`
pub fn create_json_driver(path: impl Into<PathBuf>) -> Result<JsonDriver> {
    JsonDriver::new(path)
}

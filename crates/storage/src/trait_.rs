//! Driver trait definition
//!
//! Contract every backing store implements. All operations are scoped
//! to a table, and `prepare` runs before any other call on that table.

use async_trait::async_trait;
use qkv_core::{Result, Row};
use serde_json::Value;
use std::sync::Arc;

#[async_trait]
pub trait Driver: Send + Sync {
    /// Short name used in logs and connection errors
    fn name(&self) -> &'static str;

    /// Open the underlying connection. Stores without one keep the default.
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    /// Idempotent per-table initialization
    async fn prepare(&self, table: &str) -> Result<()>;

    /// Every row of `table` in the table's iteration order
    async fn get_all_rows(&self, table: &str) -> Result<Vec<Row>>;

    /// Rows whose id starts with `prefix` (case-sensitive)
    async fn get_starts_with(&self, table: &str, prefix: &str) -> Result<Vec<Row>>;

    /// `(value, existed)`; a stored `null` is `(Some(Null), true)`
    async fn get_row_by_key(&self, table: &str, key: &str) -> Result<(Option<Value>, bool)>;

    /// Insert or overwrite. `existed` is the caller's belief about a prior
    /// row; drivers with a native upsert may ignore it.
    async fn set_row_by_key(
        &self,
        table: &str,
        key: &str,
        value: Value,
        existed: bool,
    ) -> Result<Value>;

    async fn delete_row_by_key(&self, table: &str, key: &str) -> Result<u64>;

    async fn delete_all_rows(&self, table: &str) -> Result<u64>;
}

/// Shared driver reference
pub type SharedDriver = Arc<dyn Driver>;

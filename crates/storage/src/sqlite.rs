//! SQLite driver - persistent local storage
//!
//! Each logical table maps to a `(ID TEXT PRIMARY KEY, json TEXT)` table.
//!
//! Features:
//! - Pooled connections opened by `connect()`
//! - Native upsert, so the existed hint is ignored
//! - Async-friendly using spawn_blocking

use async_trait::async_trait;
use qkv_core::{KvError, Result, Row};
use r2d2::Pool;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info};

use crate::trait_::{Driver, SharedDriver};

const MEMORY_PATH: &str = ":memory:";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// r2d2 connection manager for a SQLite file
#[derive(Debug)]
struct SqliteManager {
    path: PathBuf,
}

impl r2d2::ManageConnection for SqliteManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> std::result::Result<Connection, rusqlite::Error> {
        let conn = Connection::open(&self.path)?;
        if self.path.as_os_str() != MEMORY_PATH {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        }
        Ok(conn)
    }

    fn is_valid(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch("SELECT 1")
    }

    fn has_broken(&self, _conn: &mut Connection) -> bool {
        false
    }
}

/// SQLite driver
pub struct SqliteDriver {
    /// Database file path
    path: PathBuf,
    max_connections: u32,
    pool: RwLock<Option<Pool<SqliteManager>>>,
}

impl std::fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("path", &self.path)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl SqliteDriver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: 4,
            pool: RwLock::new(None),
        }
    }

    /// Private in-memory database; a single pooled connection keeps it alive
    pub fn in_memory() -> Self {
        Self::new(MEMORY_PATH).with_max_connections(1)
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Get the database path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_connected(&self) -> bool {
        self.pool.read().map(|pool| pool.is_some()).unwrap_or(false)
    }

    fn pool(&self) -> Result<Pool<SqliteManager>> {
        let guard = self.pool.read().map_err(|e| KvError::Driver(e.to_string()))?;
        guard
            .clone()
            .ok_or_else(|| KvError::Driver("SQLite driver is not connected".to_string()))
    }

    /// Run a blocking statement on a pooled connection
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool()?;
        tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(|e| KvError::Driver(e.to_string()))?;
            f(&conn).map_err(|e| KvError::Driver(e.to_string()))
        })
        .await
        .map_err(|e| KvError::Driver(e.to_string()))?
    }
}

/// Table names are interpolated into SQL, so only `[A-Za-z0-9_]` is accepted.
fn quoted_table(table: &str) -> Result<String> {
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(KvError::InvalidType(format!(
            "table name \"{}\" must only contain letters, digits and underscores",
            table
        )));
    }
    Ok(format!("\"{}\"", table))
}

fn decode_rows(raw: Vec<(String, String)>) -> Result<Vec<Row>> {
    raw.into_iter()
        .map(|(id, json)| -> Result<Row> { Ok(Row::new(id, serde_json::from_str(&json)?)) })
        .collect()
}

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let manager = SqliteManager {
            path: self.path.clone(),
        };
        let max_size = self.max_connections;
        let pool = tokio::task::spawn_blocking(move || {
            Pool::builder()
                .max_size(max_size)
                .max_lifetime(None)
                .idle_timeout(None)
                .connection_timeout(CONNECT_TIMEOUT)
                .build(manager)
        })
        .await
        .map_err(|e| KvError::Driver(e.to_string()))?
        .map_err(|e| KvError::Driver(e.to_string()))?;

        *self.pool.write().map_err(|e| KvError::Driver(e.to_string()))? = Some(pool);
        info!("SQLite driver connected at: {:?}", self.path);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let pool = self
            .pool
            .write()
            .map_err(|e| KvError::Driver(e.to_string()))?
            .take();
        if pool.is_some() {
            debug!("SQLite driver disconnected from: {:?}", self.path);
        }
        Ok(())
    }

    async fn prepare(&self, table: &str) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (ID TEXT PRIMARY KEY, json TEXT NOT NULL)",
            quoted_table(table)?
        );
        self.run(move |conn| conn.execute(&sql, [])).await?;
        debug!("Prepared SQLite table {}", table);
        Ok(())
    }

    async fn get_all_rows(&self, table: &str) -> Result<Vec<Row>> {
        let sql = format!("SELECT ID, json FROM {} ORDER BY rowid", quoted_table(table)?);
        let raw = self
            .run(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                rows.collect::<rusqlite::Result<Vec<(String, String)>>>()
            })
            .await?;
        decode_rows(raw)
    }

    async fn get_starts_with(&self, table: &str, prefix: &str) -> Result<Vec<Row>> {
        // LIKE ignores ASCII case, substr keeps the match case-sensitive
        let sql = format!(
            "SELECT ID, json FROM {} WHERE substr(ID, 1, length(?1)) = ?1 ORDER BY rowid",
            quoted_table(table)?
        );
        let prefix = prefix.to_string();
        let raw = self
            .run(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([&prefix], |row| Ok((row.get(0)?, row.get(1)?)))?;
                rows.collect::<rusqlite::Result<Vec<(String, String)>>>()
            })
            .await?;
        decode_rows(raw)
    }

    async fn get_row_by_key(&self, table: &str, key: &str) -> Result<(Option<Value>, bool)> {
        let sql = format!("SELECT json FROM {} WHERE ID = ?1", quoted_table(table)?);
        let key = key.to_string();
        let raw: Option<String> = self
            .run(move |conn| {
                conn.query_row(&sql, [&key], |row| row.get(0))
                    .optional()
            })
            .await?;

        match raw {
            Some(json) => Ok((Some(serde_json::from_str(&json)?), true)),
            None => Ok((None, false)),
        }
    }

    async fn set_row_by_key(
        &self,
        table: &str,
        key: &str,
        value: Value,
        _existed: bool,
    ) -> Result<Value> {
        let sql = format!(
            r#"
            INSERT INTO {} (ID, json) VALUES (?1, ?2)
            ON CONFLICT(ID) DO UPDATE SET json = excluded.json
            "#,
            quoted_table(table)?
        );
        let key = key.to_string();
        let json = serde_json::to_string(&value)?;
        self.run(move |conn| conn.execute(&sql, rusqlite::params![key, json]))
            .await?;
        Ok(value)
    }

    async fn delete_row_by_key(&self, table: &str, key: &str) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE ID = ?1", quoted_table(table)?);
        let key = key.to_string();
        let removed = self.run(move |conn| conn.execute(&sql, [&key])).await?;
        Ok(removed as u64)
    }

    async fn delete_all_rows(&self, table: &str) -> Result<u64> {
        let sql = format!("DELETE FROM {}", quoted_table(table)?);
        let removed = self.run(move |conn| conn.execute(&sql, [])).await?;
        Ok(removed as u64)
    }
}

/// Create a new shared SQLite driver; call `connect` before use
pub fn create_sqlite_driver(path: impl Into<PathBuf>) -> SharedDriver {
    Arc::new(SqliteDriver::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    async fn connected(path: PathBuf) -> SqliteDriver {
        let driver = SqliteDriver::new(path);
        driver.connect().await.unwrap();
        driver.prepare("json").await.unwrap();
        driver
    }

    #[tokio::test]
    async fn test_sqlite_requires_connect() {
        let dir = tempdir().unwrap();
        let driver = SqliteDriver::new(dir.path().join("test.db"));

        assert!(!driver.is_connected());
        let err = driver.prepare("json").await.unwrap_err();
        assert!(matches!(err, KvError::Driver(_)));
    }

    #[tokio::test]
    async fn test_sqlite_set_and_get() {
        let dir = tempdir().unwrap();
        let driver = connected(dir.path().join("test.db")).await;

        assert_eq!(driver.get_row_by_key("json", "k").await.unwrap(), (None, false));

        let stored = driver
            .set_row_by_key("json", "k", json!({"a": [1, 2]}), false)
            .await
            .unwrap();
        assert_eq!(stored, json!({"a": [1, 2]}));

        // the hint is wrong on purpose, upsert still overwrites
        driver.set_row_by_key("json", "k", json!(7), false).await.unwrap();
        assert_eq!(
            driver.get_row_by_key("json", "k").await.unwrap(),
            (Some(json!(7)), true)
        );
    }

    #[tokio::test]
    async fn test_sqlite_null_is_present() {
        let dir = tempdir().unwrap();
        let driver = connected(dir.path().join("test.db")).await;

        driver.set_row_by_key("json", "n", Value::Null, false).await.unwrap();
        assert_eq!(
            driver.get_row_by_key("json", "n").await.unwrap(),
            (Some(Value::Null), true)
        );
    }

    #[tokio::test]
    async fn test_sqlite_order_and_prefix() {
        let dir = tempdir().unwrap();
        let driver = connected(dir.path().join("test.db")).await;

        for key in ["user_b", "User_c", "user_a", "user%x", "other"] {
            driver.set_row_by_key("json", key, json!(key), false).await.unwrap();
        }

        let all = driver.get_all_rows("json").await.unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["user_b", "User_c", "user_a", "user%x", "other"]);

        let users = driver.get_starts_with("json", "user").await.unwrap();
        let ids: Vec<&str> = users.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["user_b", "user_a", "user%x"]);

        let literal = driver.get_starts_with("json", "user%").await.unwrap();
        assert_eq!(literal.len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_delete_counts() {
        let dir = tempdir().unwrap();
        let driver = connected(dir.path().join("test.db")).await;

        driver.set_row_by_key("json", "a", json!(1), false).await.unwrap();
        driver.set_row_by_key("json", "b", json!(2), false).await.unwrap();

        assert_eq!(driver.delete_row_by_key("json", "a").await.unwrap(), 1);
        assert_eq!(driver.delete_row_by_key("json", "a").await.unwrap(), 0);
        assert_eq!(driver.delete_all_rows("json").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_persists_across_reconnect() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");

        let driver = connected(path.clone()).await;
        driver.set_row_by_key("json", "k", json!("kept"), false).await.unwrap();
        driver.disconnect().await.unwrap();
        assert!(!driver.is_connected());

        let reopened = connected(path).await;
        assert_eq!(
            reopened.get_row_by_key("json", "k").await.unwrap().0,
            Some(json!("kept"))
        );
    }

    #[tokio::test]
    async fn test_sqlite_rejects_unsafe_table_names() {
        let driver = SqliteDriver::in_memory();
        driver.connect().await.unwrap();

        let err = driver.prepare("users; DROP TABLE x").await.unwrap_err();
        assert_eq!(err.kind(), Some(qkv_core::ErrorKind::InvalidType));
    }

    #[tokio::test]
    async fn test_sqlite_in_memory() {
        let driver = SqliteDriver::in_memory();
        driver.connect().await.unwrap();
        driver.prepare("cache").await.unwrap();
        driver.set_row_by_key("cache", "k", json!(true), false).await.unwrap();
        assert_eq!(driver.get_all_rows("cache").await.unwrap().len(), 1);
    }
}

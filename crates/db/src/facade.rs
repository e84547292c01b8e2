//! Key-value facade
//!
//! Resolves dot-path keys, implements the numeric and array helpers on top
//! of whole-value reads and writes, and scopes every call to one table.
//!
//! Every helper that changes an existing value reads it, changes it in
//! memory and writes the whole value back. There is no locking between
//! the read and the write: a concurrent writer to the same key in between
//! can be overwritten.

use qkv_core::path::{self, KeyPath};
use qkv_core::{DbConfig, KvError, Result, Row};
use qkv_persistence::JsonDriver;
use qkv_storage::SharedDriver;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::matcher::Matcher;

/// Construction options
#[derive(Clone, Default)]
pub struct QuickDbOptions {
    pub config: DbConfig,

    /// Externally supplied driver; a JSON store at `config.file_path` otherwise
    pub driver: Option<SharedDriver>,
}

impl QuickDbOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_driver(mut self, driver: SharedDriver) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.config.table = table.into();
        self
    }

    pub fn with_file_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config.file_path = path.into();
        self
    }

    pub fn with_normal_keys(mut self, normal_keys: bool) -> Self {
        self.config.normal_keys = normal_keys;
        self
    }
}

impl From<DbConfig> for QuickDbOptions {
    fn from(config: DbConfig) -> Self {
        Self {
            config,
            driver: None,
        }
    }
}

impl fmt::Debug for QuickDbOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuickDbOptions")
            .field("config", &self.config)
            .field("driver", &self.driver.as_ref().map(|d| d.name()))
            .finish()
    }
}

/// A table-scoped handle over one driver
pub struct QuickDb {
    driver: SharedDriver,
    table: String,
    normal_keys: AtomicBool,
    options: QuickDbOptions,
}

impl fmt::Debug for QuickDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuickDb")
            .field("driver", &self.driver.name())
            .field("table", &self.table)
            .field("normal_keys", &self.normal_keys())
            .finish()
    }
}

fn missing_value() -> KvError {
    KvError::MissingValue("second argument (value) is required".to_string())
}

/// Stored `null` reads the same as an absent key for the helpers
fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

impl QuickDb {
    /// Build a handle; opens the default JSON store when no driver is given.
    ///
    /// Call [`init`](Self::init) before first use.
    pub fn new(mut options: QuickDbOptions) -> Result<Self> {
        if options.config.table.is_empty() {
            return Err(KvError::MissingKey("table name is required".to_string()));
        }

        let driver = match &options.driver {
            Some(driver) => Arc::clone(driver),
            None => {
                let driver: SharedDriver = Arc::new(JsonDriver::new(&options.config.file_path)?);
                options.driver = Some(Arc::clone(&driver));
                driver
            }
        };

        Ok(Self {
            driver,
            table: options.config.table.clone(),
            normal_keys: AtomicBool::new(options.config.normal_keys),
            options,
        })
    }

    pub fn driver(&self) -> &SharedDriver {
        &self.driver
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn options(&self) -> &QuickDbOptions {
        &self.options
    }

    pub fn normal_keys(&self) -> bool {
        self.normal_keys.load(Ordering::Relaxed)
    }

    /// Toggle literal-dot keys for later calls on this handle
    pub fn use_normal_keys(&self, activate: bool) {
        self.normal_keys.store(activate, Ordering::Relaxed);
    }

    /// Connect the driver and prepare the active table
    pub async fn init(&self) -> Result<()> {
        self.driver
            .connect()
            .await
            .map_err(|e| KvError::connect(self.driver.name(), e))?;
        debug!("Connected {} driver", self.driver.name());
        self.driver.prepare(&self.table).await
    }

    pub async fn close(&self) -> Result<()> {
        self.driver.disconnect().await
    }

    fn key_path<'k>(&self, key: &'k str) -> Result<KeyPath<'k>> {
        if key.is_empty() {
            return Err(KvError::MissingKey("first argument (key) is required".to_string()));
        }
        Ok(KeyPath::parse(key, self.normal_keys()))
    }

    /// Every row of the active table
    pub async fn all(&self) -> Result<Vec<Row>> {
        self.driver.get_all_rows(&self.table).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        let key_path = self.key_path(key)?;
        let (value, _) = self.driver.get_row_by_key(&self.table, key_path.root).await?;
        if !key_path.is_nested() {
            return Ok(value);
        }
        Ok(value
            .as_ref()
            .and_then(|root| path::get_path(root, &key_path.segments))
            .cloned())
    }

    /// Typed read
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match present(self.get(key).await?) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Store `value` at `key`; a path key merges into the stored root value.
    pub async fn set(&self, key: &str, value: impl Into<Value>) -> Result<Value> {
        let value = value.into();
        if value.is_null() {
            return Err(missing_value());
        }

        let key_path = self.key_path(key)?;
        let (current, existed) = self.driver.get_row_by_key(&self.table, key_path.root).await?;
        if !key_path.is_nested() {
            return self
                .driver
                .set_row_by_key(&self.table, key_path.root, value, existed)
                .await;
        }

        let mut root = current
            .filter(path::is_container)
            .unwrap_or_else(|| Value::Object(Map::new()));
        path::set_path(&mut root, &key_path.segments, value)?;
        self.driver
            .set_row_by_key(&self.table, key_path.root, root, existed)
            .await
    }

    /// Merge the top-level fields of `partial` into the object at `key`
    pub async fn update(&self, key: &str, partial: Value) -> Result<Value> {
        let fields = match partial {
            Value::Object(fields) => fields,
            other => {
                return Err(KvError::InvalidType(format!(
                    "second argument (object) must be an object, got {}",
                    type_name(&other)
                )))
            }
        };

        let mut data = match present(self.get(key).await?) {
            None => Map::new(),
            Some(Value::Object(data)) => data,
            Some(other) => {
                return Err(KvError::InvalidType(format!(
                    "current value at key ({}) is {}, update only works on objects",
                    key,
                    type_name(&other)
                )))
            }
        };
        data.extend(fields);
        self.set(key, Value::Object(data)).await
    }

    pub async fn has(&self, key: &str) -> Result<bool> {
        Ok(present(self.get(key).await?).is_some())
    }

    /// Remove a row, or only the nested field of a path key.
    ///
    /// A path key always writes its root back, as `{}` when it was absent
    /// or not a container. Returns how many rows or fields were removed.
    pub async fn delete(&self, key: &str) -> Result<u64> {
        let key_path = self.key_path(key)?;
        if !key_path.is_nested() {
            return self.driver.delete_row_by_key(&self.table, key_path.root).await;
        }

        let (current, existed) = self.driver.get_row_by_key(&self.table, key_path.root).await?;
        let mut root = current
            .filter(path::is_container)
            .unwrap_or_else(|| Value::Object(Map::new()));
        let removed = path::unset_path(&mut root, &key_path.segments);
        self.driver
            .set_row_by_key(&self.table, key_path.root, root, existed)
            .await?;
        Ok(u64::from(removed))
    }

    /// Clear the active table
    pub async fn delete_all(&self) -> Result<u64> {
        self.driver.delete_all_rows(&self.table).await
    }

    pub async fn add(&self, key: &str, amount: impl Into<Value>) -> Result<f64> {
        self.add_subtract(key, amount, false).await
    }

    pub async fn sub(&self, key: &str, amount: impl Into<Value>) -> Result<f64> {
        self.add_subtract(key, amount, true).await
    }

    /// Add (or subtract) `amount` to the number at `key`, absent counting as 0.
    ///
    /// Numeric strings are accepted on both sides.
    pub async fn add_subtract(
        &self,
        key: &str,
        amount: impl Into<Value>,
        is_subtract: bool,
    ) -> Result<f64> {
        let amount = amount.into();
        if amount.is_null() {
            return Err(missing_value());
        }

        let current = present(self.get(key).await?).unwrap_or_else(|| Value::from(0));
        let current = path::to_number(&current).ok_or_else(|| {
            KvError::InvalidType(format!(
                "current value at key ({}) is not a number and cannot be parsed as one",
                key
            ))
        })?;
        let amount = path::to_number(&amount).ok_or_else(|| {
            KvError::InvalidType(format!(
                "amount for key ({}) is not a number and cannot be parsed as one",
                key
            ))
        })?;

        let result = if is_subtract {
            current - amount
        } else {
            current + amount
        };
        let stored = path::number_value(result).ok_or_else(|| {
            KvError::InvalidType(format!("result for key ({}) is not a finite number", key))
        })?;
        self.set(key, stored).await?;
        Ok(result)
    }

    /// The array at `key`, empty if absent
    pub async fn get_array(&self, key: &str) -> Result<Vec<Value>> {
        match present(self.get(key).await?) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(KvError::InvalidType(format!(
                "current value at key ({}) is {}, not an array",
                key,
                type_name(&other)
            ))),
        }
    }

    pub async fn push<V: Into<Value>>(
        &self,
        key: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Value> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(missing_value());
        }

        let mut items = self.get_array(key).await?;
        items.extend(values);
        self.set(key, Value::Array(items)).await
    }

    /// Prepend `value`; an array value prepends its elements in order.
    pub async fn unshift(&self, key: &str, value: impl Into<Value>) -> Result<Value> {
        let value = value.into();
        if value.is_null() {
            return Err(missing_value());
        }

        let current = self.get_array(key).await?;
        let items = match value {
            Value::Array(mut head) => {
                head.extend(current);
                head
            }
            single => std::iter::once(single).chain(current).collect(),
        };
        self.set(key, Value::Array(items)).await
    }

    /// Remove and return the last element; the array is written back even when empty.
    pub async fn pop(&self, key: &str) -> Result<Option<Value>> {
        let mut items = self.get_array(key).await?;
        let last = items.pop();
        self.set(key, Value::Array(items)).await?;
        Ok(last)
    }

    /// Remove and return the first element; the array is written back even when empty.
    pub async fn shift(&self, key: &str) -> Result<Option<Value>> {
        let mut items = self.get_array(key).await?;
        let first = (!items.is_empty()).then(|| items.remove(0));
        self.set(key, Value::Array(items)).await?;
        Ok(first)
    }

    /// Remove matching elements, or only the first match when `once` is set.
    pub async fn pull(&self, key: &str, matcher: impl Into<Matcher>, once: bool) -> Result<Value> {
        let matcher = matcher.into();
        matcher.validate()?;

        let items = self.get_array(key).await?;
        let mut removed = false;
        let kept: Vec<Value> = items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| {
                if once && removed {
                    return Some(item);
                }
                if matcher.matches(&item, index) {
                    removed = true;
                    None
                } else {
                    Some(item)
                }
            })
            .collect();
        self.set(key, Value::Array(kept)).await
    }

    /// Rows of the active table whose id starts with `query`
    pub async fn starts_with(&self, query: &str) -> Result<Vec<Row>> {
        self.driver.get_starts_with(&self.table, query).await
    }

    /// A handle on another table sharing this driver and its connection
    pub async fn table(&self, name: &str) -> Result<QuickDb> {
        if name.is_empty() {
            return Err(KvError::MissingKey("first argument (table) is required".to_string()));
        }

        let mut options = self.options.clone();
        options.config.table = name.to_string();
        options.driver = Some(Arc::clone(&self.driver));

        let scoped = QuickDb::new(options)?;
        scoped.driver.prepare(name).await?;
        debug!("Opened table {} on {} driver", name, self.driver.name());
        Ok(scoped)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

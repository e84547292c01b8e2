//! Store configuration
//!
//! Loaded from YAML and overridable from environment variables

use crate::error::{KvError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_TABLE: &str = "QKV_TABLE";
pub const ENV_FILE_PATH: &str = "QKV_FILE_PATH";
pub const ENV_NORMAL_KEYS: &str = "QKV_NORMAL_KEYS";

/// Construction settings for a database handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Table used when none is selected explicitly
    #[serde(default = "default_table")]
    pub table: String,

    /// Snapshot file opened when no driver is supplied
    #[serde(default = "default_file_path")]
    pub file_path: PathBuf,

    /// Treat dots in keys literally instead of as nested paths
    #[serde(default)]
    pub normal_keys: bool,
}

fn default_table() -> String {
    "json".to_string()
}

fn default_file_path() -> PathBuf {
    PathBuf::from("quickdb.json")
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            file_path: default_file_path(),
            normal_keys: false,
        }
    }
}

impl DbConfig {
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = path.into();
        self
    }

    pub fn with_normal_keys(mut self, normal_keys: bool) -> Self {
        self.normal_keys = normal_keys;
        self
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| KvError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load a YAML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KvError::Config(format!("Failed to read config {:?}: {}", path, e)))?;
        Self::from_yaml_str(&content)
    }

    /// Apply `QKV_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(table) = lookup(ENV_TABLE).filter(|v| !v.trim().is_empty()) {
            self.table = table.trim().to_string();
        }
        if let Some(path) = lookup(ENV_FILE_PATH).filter(|v| !v.trim().is_empty()) {
            self.file_path = PathBuf::from(path.trim());
        }
        if let Some(flag) = lookup(ENV_NORMAL_KEYS) {
            self.normal_keys = parse_flag(&flag);
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

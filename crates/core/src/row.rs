//! Stored entry type

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One key-value pair of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    pub value: Value,
}

impl Row {
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

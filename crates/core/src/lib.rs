// QKV Core - shared data model
//!
//! Contains:
//! - Row: the `{id, value}` entry stored in a table
//! - KeyPath: dot-path resolution and nested mutation
//! - KvError: error kinds raised by every layer
//! - DbConfig: construction settings

mod config;
mod error;
pub mod path;
mod row;

pub use config::*;
pub use error::*;
pub use path::KeyPath;
pub use row::*;

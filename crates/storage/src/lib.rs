// QKV Storage Layer
//
// Driver contract with pluggable backends

pub mod trait_;
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{create_memory_driver, MemoryDriver};
pub use trait_::*;

#[cfg(feature = "sqlite")]
pub use sqlite::{create_sqlite_driver, SqliteDriver};

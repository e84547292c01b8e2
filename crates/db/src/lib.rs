//! QKV - key-value database over pluggable drivers
//!
//! ```no_run
//! # async fn demo() -> qkv_db::Result<()> {
//! use qkv_db::{QuickDb, QuickDbOptions};
//!
//! let db = QuickDb::new(QuickDbOptions::new().with_file_path("data.json"))?;
//! db.init().await?;
//! db.set("user.name", "ana").await?;
//! db.push("user.tags", ["admin"]).await?;
//! assert_eq!(db.get("user.name").await?, Some("ana".into()));
//! # Ok(())
//! # }
//! ```

pub mod facade;
pub mod matcher;
pub mod registry;

pub use facade::{QuickDb, QuickDbOptions};
pub use matcher::Matcher;
pub use registry::{get_singleton, global, register_singleton, Registry};

pub use qkv_core::{DbConfig, ErrorKind, KvError, Result, Row};
pub use qkv_persistence::JsonDriver;
pub use qkv_storage::{create_memory_driver, Driver, MemoryDriver, SharedDriver};

#[cfg(feature = "sqlite")]
pub use qkv_storage::SqliteDriver;

//! QKV Persistence - file-backed drivers
//!
//! - JSON snapshot store: in-memory working set, whole-file atomic replace
//!   after every write
//! - Staged temp-file + rename writer shared by the stores

pub mod atomic;
pub mod json;

pub use json::{create_json_driver, JsonDriver};

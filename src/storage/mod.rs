//! Reference storage interfaces
//!
//! - [`MemoryStorage`]: a process-local graph, useful for tests and one-shot runs
//! - [`SqliteStorage`]: a persistent store in a single SQLite file

mod error;
mod memory;
mod sqlite;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

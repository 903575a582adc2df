//! SQLite persistence for Chainweave.

pub mod memory;
pub mod pool;

pub use memory::SqliteMemoryStore;
pub use pool::{DatabasePool, default_database_url};

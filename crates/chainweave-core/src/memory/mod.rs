//! Workflow memory: the append-only store trait and the manager that
//! interprets step memory requirements.

pub mod manager;
pub mod store;

pub use manager::{MemoryError, MemoryManager, MemoryNeed};
pub use store::{InMemoryStore, MemoryStore};

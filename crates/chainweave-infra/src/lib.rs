//! Infrastructure implementations for Chainweave.
//!
//! Implements the traits defined in `chainweave-core`: the SQLite-backed
//! memory store, the environment key source, and the reqwest-based LLM
//! provider clients.

pub mod llm;
pub mod secret;
pub mod sqlite;

//! Shared domain types for Chainweave.
//!
//! This crate contains the core domain types used across the Chainweave
//! engine: workflow definitions, memory slices, LLM model specs, and their
//! associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod error;
pub mod llm;
pub mod memory;
pub mod workflow;

//! LLM client abstraction.
//!
//! [`client::LlmClient`] is the uniform prompt-in/text-out contract every
//! provider backend implements; [`box_client::BoxLlmClient`] is its
//! type-erased form for runtime provider selection.

pub mod box_client;
pub mod client;

pub use box_client::BoxLlmClient;
pub use client::{ClientFactory, LlmClient};

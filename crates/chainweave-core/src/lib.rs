//! Workflow engine and store trait definitions for Chainweave.
//!
//! This crate holds the business logic: template resolution, workflow
//! definition loading, the memory manager, the tool abstraction, and the
//! executor state machine. It defines the "ports" (async traits) that the
//! infrastructure layer implements. It depends only on `chainweave-types`
//! -- never on `chainweave-infra` or any database/HTTP crate.

pub mod config;
pub mod definition;
pub mod executor;
pub mod llm;
pub mod memory;
pub mod secret;
pub mod template;
pub mod tool;

//! Tool abstraction: the `Tool` trait, its type-erased box wrapper, and
//! the registry the executor dispatches through.
//!
//! `Tool` uses RPITIT, so it cannot be a trait object directly. The same
//! three-part pattern as [`crate::llm::box_client`] applies: an
//! object-safe `ToolDyn` trait with boxed futures, a blanket impl, and a
//! `BoxTool` wrapper that delegates.

pub mod model_call;
pub mod parallel_query;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

use chainweave_types::error::ToolError;

pub use model_call::ModelCallTool;
pub use parallel_query::ParallelQueryTool;

/// A step tool: validates its inputs and produces a result value.
///
/// Inputs arrive fully resolved (no `{{...}}` placeholders left). The
/// result is an arbitrary value tree; by convention tools put their main
/// text under an `output` key.
pub trait Tool: Send + Sync {
    /// Tool id steps refer to (e.g. "model_call").
    fn name(&self) -> &str;

    /// Execute with resolved inputs.
    fn execute(
        &self,
        inputs: &Map<String, Value>,
    ) -> impl std::future::Future<Output = Result<Value, ToolError>> + Send;
}

/// Object-safe version of [`Tool`] with boxed futures.
pub trait ToolDyn: Send + Sync {
    fn name(&self) -> &str;

    fn execute_boxed<'a>(
        &'a self,
        inputs: &'a Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;
}

/// Blanket implementation: any `Tool` automatically implements `ToolDyn`.
impl<T: Tool> ToolDyn for T {
    fn name(&self) -> &str {
        Tool::name(self)
    }

    fn execute_boxed<'a>(
        &'a self,
        inputs: &'a Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>> {
        Box::pin(self.execute(inputs))
    }
}

/// Type-erased tool for registry storage.
pub struct BoxTool {
    inner: Box<dyn ToolDyn + Send + Sync>,
}

impl BoxTool {
    /// Wrap a concrete `Tool` in a type-erased box.
    pub fn new<T: Tool + 'static>(tool: T) -> Self {
        Self {
            inner: Box::new(tool),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn execute(&self, inputs: &Map<String, Value>) -> Result<Value, ToolError> {
        self.inner.execute_boxed(inputs).await
    }
}

/// Registry of available tools, keyed by tool id.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, BoxTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name. Replaces any previous tool
    /// with the same name.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let boxed = BoxTool::new(tool);
        self.tools.insert(boxed.name().to_string(), boxed);
    }

    /// Look up a tool by id.
    pub fn get(&self, tool_id: &str) -> Option<&BoxTool> {
        self.tools.get(tool_id)
    }

    /// Registered tool ids, sorted.
    pub fn tool_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

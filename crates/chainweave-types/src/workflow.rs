//! Workflow domain types for Chainweave.
//!
//! Defines the declarative workflow shapes parsed from `config.yaml`: the
//! top-level config, per-workflow definitions, step definitions, approval
//! gates, and the two legacy parameter formats together with the canonical
//! descriptor they normalize into at load time.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// The parsed top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfigFile {
    /// Optional default model settings (provider, model) applied when a
    /// step omits them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_llm: Option<BTreeMap<String, String>>,
    /// All workflows, keyed by name.
    pub workflows: BTreeMap<String, WorkflowDefinition>,
}

// ---------------------------------------------------------------------------
// Workflow definition
// ---------------------------------------------------------------------------

/// A single declarative workflow: a parameter schema plus an ordered list
/// of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Parameter schema in either legacy format. Normalized into
    /// [`ParamDescriptor`]s at load time.
    #[serde(default)]
    pub params: ParamsSection,
    /// Ordered steps executed strictly in sequence.
    pub steps: Vec<StepDefinition>,
}

/// A single step in a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Step name. Unique within a workflow.
    pub name: String,
    /// Tool id to dispatch to (e.g. "model_call", "parallel_query").
    pub tool: String,
    /// Raw step inputs, possibly containing `{{...}}` placeholders.
    #[serde(default)]
    pub inputs: serde_json::Map<String, Value>,
    /// Memory requirements for this step.
    #[serde(default)]
    pub memory: MemorySpec,
    /// When present, this step is an approval gate instead of a tool call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateSpec>,
    /// What to do when this step fails.
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

/// Memory requirements declared on a step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySpec {
    /// Need specifications, e.g. `last_user_prompt`, `tool_output(draft)`.
    #[serde(default)]
    pub needs: Vec<String>,
}

/// Approval gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSpec {
    /// Prompt shown to the approver. May contain `{{...}}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

/// Per-step failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole run, returning partial outputs.
    #[default]
    AbortChain,
    /// Record the error as the step's output and keep going.
    Continue,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::AbortChain => write!(f, "abort_chain"),
            FailurePolicy::Continue => write!(f, "continue"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "abort_chain" => Ok(FailurePolicy::AbortChain),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(format!("invalid failure policy: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter schema (legacy formats + canonical descriptor)
// ---------------------------------------------------------------------------

/// The `params:` section in either of its two accepted formats.
///
/// The list format mixes bare names (required, no default), single-entry
/// maps of name to default string (optional), and single-entry maps of
/// name to a full spec. The map format maps names to [`ParamSpec`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamsSection {
    List(Vec<ParamListEntry>),
    Map(BTreeMap<String, ParamSpec>),
}

impl Default for ParamsSection {
    fn default() -> Self {
        ParamsSection::List(Vec::new())
    }
}

/// One entry of the list-format parameter schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamListEntry {
    /// Bare name: required parameter with no default.
    Name(String),
    /// Single-entry map: name to default string or full spec.
    Entry(BTreeMap<String, Value>),
}

/// Full parameter spec (map format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Canonical parameter descriptor produced by load-time normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDescriptor {
    pub name: String,
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

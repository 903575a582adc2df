//! Memory types for Chainweave.
//!
//! These types model the append-only memory log: every meaningful event in
//! a workflow run (initial parameters, user prompt, step outputs) is
//! recorded as a classified slice with metadata and a monotonic sequence.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of a memory slice.
///
/// Used to distinguish run-initiation records from step outputs when
/// querying context for later steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    UserPrompt,
    Parameters,
    Input,
    Output,
    Error,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::UserPrompt => write!(f, "user_prompt"),
            Classification::Parameters => write!(f, "parameters"),
            Classification::Input => write!(f, "input"),
            Classification::Output => write!(f, "output"),
            Classification::Error => write!(f, "error"),
        }
    }
}

impl FromStr for Classification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_prompt" => Ok(Classification::UserPrompt),
            "parameters" => Ok(Classification::Parameters),
            "input" => Ok(Classification::Input),
            "output" => Ok(Classification::Output),
            "error" => Ok(Classification::Error),
            other => Err(format!("invalid classification: '{other}'")),
        }
    }
}

/// A single persisted memory slice.
///
/// `id` is the store-assigned monotonic sequence: later appends always
/// receive larger ids, which is what run history ordering relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySlice {
    pub id: i64,
    /// Run this slice belongs to, e.g. `research_20250830_142501_a1b2c3d4`.
    pub run_id: String,
    /// Step that produced the slice (`__initial__` for run-initiation slices).
    pub step_name: String,
    /// Canonical text content. Structured content is stored pretty-printed.
    pub content: String,
    pub classification: Classification,
    /// Free-form metadata recorded alongside the content.
    pub metadata: serde_json::Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

/// A slice about to be appended. The store assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewSlice {
    pub run_id: String,
    pub step_name: String,
    pub content: String,
    pub classification: Classification,
    pub metadata: serde_json::Map<String, Value>,
}

impl NewSlice {
    /// Build a slice from plain text content.
    pub fn text(
        run_id: impl Into<String>,
        step_name: impl Into<String>,
        content: impl Into<String>,
        classification: Classification,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            step_name: step_name.into(),
            content: content.into(),
            classification,
            metadata: serde_json::Map::new(),
        }
    }

    /// Build a slice from structured content, canonicalized to text.
    pub fn structured(
        run_id: impl Into<String>,
        step_name: impl Into<String>,
        content: &Value,
        classification: Classification,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            step_name: step_name.into(),
            content: canonical_content(content),
            classification,
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach metadata, replacing any previously set map.
    pub fn with_metadata(mut self, metadata: serde_json::Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Canonical text form of slice content: strings pass through verbatim,
/// everything else is pretty-printed JSON.
pub fn canonical_content(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Filter for slice queries. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SliceFilter {
    pub run_id: Option<String>,
    pub step_name: Option<String>,
    pub classification: Option<Classification>,
}

impl SliceFilter {
    pub fn for_run(run_id: impl Into<String>) -> Self {
        Self {
            run_id: Some(run_id.into()),
            ..Self::default()
        }
    }

    pub fn step_name(mut self, step_name: impl Into<String>) -> Self {
        self.step_name = Some(step_name.into());
        self
    }

    pub fn classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }
}

/// Ordering for slice queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Highest sequence first.
    #[default]
    NewestFirst,
    /// Lowest sequence first.
    OldestFirst,
}

/// Aggregate statistics over the whole store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_entries: u64,
    pub distinct_runs: u64,
    pub by_classification: BTreeMap<String, u64>,
}

/// Summary of a single run, derived from its history.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub entry_count: usize,
    /// Names of steps that recorded an output, in execution order.
    pub step_names: Vec<String>,
    pub by_classification: BTreeMap<String, usize>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub has_user_prompt: bool,
}

//! Memory manager: interprets step memory requirements and coordinates
//! with the [`MemoryStore`] so each step sees the context it declared.
//!
//! The manager owns the notion of a "current run": [`MemoryManager::start_run`]
//! mints a run id and records the run-initiation slices, and every
//! subsequent step result is appended under that id. Need specifications
//! from a step's `memory.needs` list are parsed into [`MemoryNeed`]s,
//! resolved against the store and the in-run history, and handed back as
//! `memory.*` variables for literal injection before generic template
//! resolution runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use chainweave_types::error::StoreError;
use chainweave_types::memory::{
    Classification, MemorySlice, NewSlice, RunSummary, SliceFilter, canonical_content,
};
use chainweave_types::workflow::StepDefinition;

use super::store::MemoryStore;
use crate::template::value_to_string;

/// Errors from memory manager operations.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("no active run: call start_run first")]
    NoActiveRun,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One entry of the in-run history kept by the manager.
///
/// `last_output` / `previous_output` needs resolve against this list, not
/// the store, so they reflect exactly what ran in this process.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub step_name: String,
    pub result: Value,
    pub recorded_at: DateTime<Utc>,
    pub slice_id: i64,
}

// ---------------------------------------------------------------------------
// Need specifications
// ---------------------------------------------------------------------------

/// A parsed memory need specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryNeed {
    /// `last_user_prompt` / `user_prompt`: the run's original user prompt.
    UserPrompt,
    /// `tool_output(step)` / `step_output(step)`: a step's stored output.
    ToolOutput(String),
    /// `last_output` / `previous_output`: output of the most recent step.
    LastOutput,
    /// `step(step)`: a step's stored output, injected under the step name.
    Step(String),
    /// Bare identifier: treated as a step name.
    Direct(String),
}

impl MemoryNeed {
    /// Parse a need specification. Returns `None` for specs that match no
    /// known shape.
    pub fn parse(need: &str) -> Option<MemoryNeed> {
        let need = need.trim();

        match need {
            "last_user_prompt" | "user_prompt" => return Some(MemoryNeed::UserPrompt),
            "last_output" | "previous_output" => return Some(MemoryNeed::LastOutput),
            _ => {}
        }

        if let Some(step) = call_arg(need, "tool_output").or_else(|| call_arg(need, "step_output"))
        {
            return Some(MemoryNeed::ToolOutput(step));
        }
        if let Some(step) = call_arg(need, "step") {
            return Some(MemoryNeed::Step(step));
        }

        if !need.is_empty() && !need.contains(['(', ')', '[', ']', '{', '}']) {
            return Some(MemoryNeed::Direct(need.to_string()));
        }

        None
    }

    /// Deterministic `memory.*` variable name this need injects under.
    pub fn variable_name(&self) -> String {
        match self {
            MemoryNeed::UserPrompt => "memory.user_prompt".to_string(),
            MemoryNeed::LastOutput => "memory.last_output".to_string(),
            MemoryNeed::ToolOutput(step) => format!("memory.{step}_output"),
            MemoryNeed::Step(step) => format!("memory.{step}"),
            MemoryNeed::Direct(name) => format!("memory.{}", sanitize(name)),
        }
    }
}

/// Extract the argument of `func(arg)`-style needs. Trailing text after
/// the closing parenthesis is ignored.
fn call_arg(need: &str, func: &str) -> Option<String> {
    let rest = need.strip_prefix(func)?.strip_prefix('(')?;
    let end = rest.find(')')?;
    let arg = rest[..end].trim();
    if arg.is_empty() {
        None
    } else {
        Some(arg.to_string())
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

// ---------------------------------------------------------------------------
// MemoryManager
// ---------------------------------------------------------------------------

/// Step name recorded for run-initiation slices.
pub const INITIAL_STEP: &str = "__initial__";

/// Orchestrates workflow memory over a [`MemoryStore`].
pub struct MemoryManager<S: MemoryStore> {
    store: S,
    current_run_id: Option<String>,
    history: Vec<HistoryEntry>,
}

impl<S: MemoryStore> MemoryManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            current_run_id: None,
            history: Vec::new(),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run id of the active run, if any.
    pub fn current_run_id(&self) -> Option<&str> {
        self.current_run_id.as_deref()
    }

    /// In-run history of step results recorded so far.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Start a new run: mint a unique run id and record the run-initiation
    /// slices (the full parameter map, plus the user prompt when present).
    pub async fn start_run(
        &mut self,
        workflow_name: &str,
        params: &Map<String, Value>,
    ) -> Result<String, StoreError> {
        let run_id = mint_run_id(workflow_name);
        tracing::info!(run_id = %run_id, workflow = workflow_name, "starting run");

        if let Some(user_prompt) = params.get("user_prompt") {
            let mut metadata = Map::new();
            metadata.insert("workflow_name".to_string(), Value::String(workflow_name.to_string()));
            metadata.insert("all_params".to_string(), Value::Object(params.clone()));
            self.store
                .append(
                    NewSlice::structured(
                        &run_id,
                        INITIAL_STEP,
                        user_prompt,
                        Classification::UserPrompt,
                    )
                    .with_metadata(metadata),
                )
                .await?;
        }

        let mut metadata = Map::new();
        metadata.insert("workflow_name".to_string(), Value::String(workflow_name.to_string()));
        self.store
            .append(
                NewSlice::structured(
                    &run_id,
                    INITIAL_STEP,
                    &Value::Object(params.clone()),
                    Classification::Parameters,
                )
                .with_metadata(metadata),
            )
            .await?;

        self.current_run_id = Some(run_id.clone());
        self.history.clear();
        Ok(run_id)
    }

    /// Record a step's result: append an output slice and an in-run
    /// history entry.
    pub async fn save_step_result(
        &mut self,
        step_name: &str,
        result: &Value,
    ) -> Result<MemorySlice, MemoryError> {
        let run_id = self
            .current_run_id
            .clone()
            .ok_or(MemoryError::NoActiveRun)?;

        let content = canonical_content(result.get("output").unwrap_or(result));
        let metadata = step_metadata(result);

        let slice = self
            .store
            .append(
                NewSlice::text(&run_id, step_name, content, Classification::Output)
                    .with_metadata(metadata),
            )
            .await?;

        self.history.push(HistoryEntry {
            step_name: step_name.to_string(),
            result: result.clone(),
            recorded_at: Utc::now(),
            slice_id: slice.id,
        });

        Ok(slice)
    }

    /// Resolve a step's declared memory needs into `memory.*` variables.
    ///
    /// Unresolvable needs (unknown shapes, missing slices, store failures)
    /// are skipped with a warning; the step still runs with whatever
    /// context could be gathered.
    pub async fn fetch_context(&self, step: &StepDefinition) -> BTreeMap<String, String> {
        let mut context = BTreeMap::new();
        let Some(run_id) = self.current_run_id.as_deref() else {
            return context;
        };
        if step.memory.needs.is_empty() {
            return context;
        }

        for raw in &step.memory.needs {
            let Some(need) = MemoryNeed::parse(raw) else {
                tracing::warn!(step = %step.name, need = %raw, "unrecognized memory need, skipping");
                continue;
            };
            match self.resolve_need(&need, run_id).await {
                Ok(Some(value)) => {
                    context.insert(need.variable_name(), value);
                }
                Ok(None) => {
                    tracing::warn!(step = %step.name, need = %raw, "memory need resolved to nothing, skipping");
                }
                Err(e) => {
                    tracing::warn!(step = %step.name, need = %raw, error = %e, "failed to resolve memory need, skipping");
                }
            }
        }

        context
    }

    async fn resolve_need(
        &self,
        need: &MemoryNeed,
        run_id: &str,
    ) -> Result<Option<String>, StoreError> {
        match need {
            MemoryNeed::UserPrompt => {
                let slice = self
                    .store
                    .latest(
                        &SliceFilter::for_run(run_id).classification(Classification::UserPrompt),
                    )
                    .await?;
                Ok(slice.map(|s| s.content))
            }
            MemoryNeed::LastOutput => Ok(self
                .history
                .last()
                .and_then(|entry| entry.result.get("output"))
                .map(value_to_string)),
            MemoryNeed::ToolOutput(step)
            | MemoryNeed::Step(step)
            | MemoryNeed::Direct(step) => {
                let slice = self
                    .store
                    .latest(
                        &SliceFilter::for_run(run_id)
                            .step_name(step.clone())
                            .classification(Classification::Output),
                    )
                    .await?;
                Ok(slice.map(|s| s.content))
            }
        }
    }

    /// Literally replace `{{memory.<key>}}` tokens in step inputs with the
    /// fetched context values. Runs before generic template resolution; the
    /// inputs are deep-copied, never mutated in place.
    pub fn inject_context(
        &self,
        inputs: &Map<String, Value>,
        context: &BTreeMap<String, String>,
    ) -> Map<String, Value> {
        if context.is_empty() {
            return inputs.clone();
        }
        let mut injected = Map::with_capacity(inputs.len());
        for (key, value) in inputs {
            injected.insert(key.clone(), inject_value(value, context));
        }
        injected
    }

    /// Per-run summary derived from the store's history.
    pub async fn run_summary(&self, run_id: &str) -> Result<RunSummary, StoreError> {
        let history = self.store.history(run_id).await?;

        let mut by_classification: BTreeMap<String, usize> = BTreeMap::new();
        let mut step_names = Vec::new();
        for slice in &history {
            *by_classification
                .entry(slice.classification.to_string())
                .or_insert(0) += 1;
            if slice.classification == Classification::Output {
                step_names.push(slice.step_name.clone());
            }
        }

        Ok(RunSummary {
            run_id: run_id.to_string(),
            entry_count: history.len(),
            step_names,
            by_classification,
            started_at: history.first().map(|s| s.created_at),
            last_activity_at: history.last().map(|s| s.created_at),
            has_user_prompt: history
                .iter()
                .any(|s| s.classification == Classification::UserPrompt),
        })
    }
}

fn inject_value(value: &Value, context: &BTreeMap<String, String>) -> Value {
    match value {
        Value::String(s) => {
            let mut out = s.clone();
            for (var_name, var_value) in context {
                let token = format!("{{{{{var_name}}}}}");
                if out.contains(&token) {
                    out = out.replace(&token, var_value);
                }
            }
            Value::String(out)
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), inject_value(v, context)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| inject_value(v, context)).collect())
        }
        other => other.clone(),
    }
}

/// Metadata recorded with a step output slice: provider, model, simulated
/// flag, and token count when the tool reported them.
fn step_metadata(result: &Value) -> Map<String, Value> {
    let mut metadata = Map::new();
    for key in ["provider", "model", "token_count"] {
        if let Some(value) = result.get(key) {
            metadata.insert(key.to_string(), value.clone());
        }
    }
    metadata.insert(
        "simulated".to_string(),
        result.get("simulated").cloned().unwrap_or(Value::Bool(false)),
    );
    metadata
}

/// Mint a run id: `{workflow}_{yyyymmdd_HHMMSS}_{8-char suffix}`.
fn mint_run_id(workflow_name: &str) -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let uuid = Uuid::now_v7().simple().to_string();
    // The tail of a v7 UUID is its random section.
    let suffix = &uuid[uuid.len() - 8..];
    format!("{workflow_name}_{stamp}_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::store::InMemoryStore;
    use chainweave_types::workflow::MemorySpec;
    use serde_json::json;

    fn step_with_needs(needs: &[&str]) -> StepDefinition {
        StepDefinition {
            name: "consumer".to_string(),
            tool: "model_call".to_string(),
            inputs: Map::new(),
            memory: MemorySpec {
                needs: needs.iter().map(|s| s.to_string()).collect(),
            },
            gate: None,
            on_failure: Default::default(),
        }
    }

    fn params(user_prompt: Option<&str>) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(prompt) = user_prompt {
            map.insert("user_prompt".to_string(), json!(prompt));
        }
        map.insert("style".to_string(), json!("concise"));
        map
    }

    #[test]
    fn test_need_parsing() {
        assert_eq!(MemoryNeed::parse("last_user_prompt"), Some(MemoryNeed::UserPrompt));
        assert_eq!(MemoryNeed::parse("user_prompt"), Some(MemoryNeed::UserPrompt));
        assert_eq!(
            MemoryNeed::parse("tool_output(draft)"),
            Some(MemoryNeed::ToolOutput("draft".to_string()))
        );
        assert_eq!(
            MemoryNeed::parse("step_output( draft )"),
            Some(MemoryNeed::ToolOutput("draft".to_string()))
        );
        assert_eq!(MemoryNeed::parse("previous_output"), Some(MemoryNeed::LastOutput));
        assert_eq!(
            MemoryNeed::parse("step(review)"),
            Some(MemoryNeed::Step("review".to_string()))
        );
        assert_eq!(
            MemoryNeed::parse("draft"),
            Some(MemoryNeed::Direct("draft".to_string()))
        );
        assert_eq!(MemoryNeed::parse("broken("), None);
        assert_eq!(MemoryNeed::parse(""), None);
    }

    #[test]
    fn test_variable_names() {
        assert_eq!(MemoryNeed::UserPrompt.variable_name(), "memory.user_prompt");
        assert_eq!(MemoryNeed::LastOutput.variable_name(), "memory.last_output");
        assert_eq!(
            MemoryNeed::ToolOutput("draft".to_string()).variable_name(),
            "memory.draft_output"
        );
        assert_eq!(
            MemoryNeed::Step("review".to_string()).variable_name(),
            "memory.review"
        );
        assert_eq!(
            MemoryNeed::Direct("my step!".to_string()).variable_name(),
            "memory.my_step_"
        );
    }

    #[test]
    fn test_run_id_shape() {
        let run_id = mint_run_id("research");
        let parts: Vec<&str> = run_id.split('_').collect();
        // research_YYYYMMDD_HHMMSS_suffix
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "research");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), 8);
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(mint_run_id("wf"), mint_run_id("wf"));
    }

    #[tokio::test]
    async fn test_start_run_records_initiation_slices() {
        let mut manager = MemoryManager::new(InMemoryStore::new());
        let run_id = manager
            .start_run("research", &params(Some("tell me about rust")))
            .await
            .unwrap();

        let history = manager.store().history(&run_id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].classification, Classification::UserPrompt);
        assert_eq!(history[0].content, "tell me about rust");
        assert_eq!(history[0].step_name, INITIAL_STEP);
        assert_eq!(history[1].classification, Classification::Parameters);
    }

    #[tokio::test]
    async fn test_start_run_without_user_prompt() {
        let mut manager = MemoryManager::new(InMemoryStore::new());
        let run_id = manager.start_run("research", &params(None)).await.unwrap();

        let history = manager.store().history(&run_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].classification, Classification::Parameters);
    }

    #[tokio::test]
    async fn test_save_step_result_requires_active_run() {
        let mut manager = MemoryManager::new(InMemoryStore::new());
        let err = manager
            .save_step_result("draft", &json!({"output": "text"}))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::NoActiveRun));
    }

    #[tokio::test]
    async fn test_save_step_result_extracts_output_and_metadata() {
        let mut manager = MemoryManager::new(InMemoryStore::new());
        let run_id = manager.start_run("research", &params(None)).await.unwrap();

        let slice = manager
            .save_step_result(
                "draft",
                &json!({
                    "output": "draft text",
                    "provider": "anthropic",
                    "model": "claude-sonnet-4-20250514",
                    "simulated": false,
                    "token_count": 2,
                }),
            )
            .await
            .unwrap();

        assert_eq!(slice.run_id, run_id);
        assert_eq!(slice.content, "draft text");
        assert_eq!(slice.classification, Classification::Output);
        assert_eq!(slice.metadata["provider"], "anthropic");
        assert_eq!(slice.metadata["simulated"], false);
        assert_eq!(manager.history().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_context_resolves_needs() {
        let mut manager = MemoryManager::new(InMemoryStore::new());
        manager
            .start_run("research", &params(Some("the question")))
            .await
            .unwrap();
        manager
            .save_step_result("draft", &json!({"output": "draft text"}))
            .await
            .unwrap();

        let context = manager
            .fetch_context(&step_with_needs(&[
                "last_user_prompt",
                "tool_output(draft)",
                "last_output",
            ]))
            .await;

        assert_eq!(context["memory.user_prompt"], "the question");
        assert_eq!(context["memory.draft_output"], "draft text");
        assert_eq!(context["memory.last_output"], "draft text");
    }

    #[tokio::test]
    async fn test_fetch_context_skips_unresolvable_needs() {
        let mut manager = MemoryManager::new(InMemoryStore::new());
        manager.start_run("research", &params(None)).await.unwrap();

        let context = manager
            .fetch_context(&step_with_needs(&[
                "user_prompt",          // no user prompt was recorded
                "tool_output(missing)", // step never ran
                "???[]",                // unparseable
            ]))
            .await;
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_context_without_active_run_is_empty() {
        let manager = MemoryManager::new(InMemoryStore::new());
        let context = manager.fetch_context(&step_with_needs(&["user_prompt"])).await;
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_last_output_uses_in_run_history() {
        let mut manager = MemoryManager::new(InMemoryStore::new());
        manager.start_run("research", &params(None)).await.unwrap();
        manager
            .save_step_result("first", &json!({"output": "one"}))
            .await
            .unwrap();
        manager
            .save_step_result("second", &json!({"output": "two"}))
            .await
            .unwrap();

        let context = manager
            .fetch_context(&step_with_needs(&["previous_output"]))
            .await;
        assert_eq!(context["memory.last_output"], "two");
    }

    #[tokio::test]
    async fn test_inject_context_is_literal_and_deep() {
        let manager = MemoryManager::new(InMemoryStore::new());
        let mut context = BTreeMap::new();
        context.insert("memory.user_prompt".to_string(), "the question".to_string());

        let Value::Object(inputs) = json!({
            "prompt": "Answer: {{memory.user_prompt}}",
            "nested": {"inner": ["{{memory.user_prompt}}", 1]},
            "untouched": "{{params.style}}",
        }) else {
            unreachable!()
        };

        let injected = manager.inject_context(&inputs, &context);
        assert_eq!(injected["prompt"], "Answer: the question");
        assert_eq!(injected["nested"]["inner"][0], "the question");
        // Non-memory placeholders are left for the generic resolver.
        assert_eq!(injected["untouched"], "{{params.style}}");
        // Original inputs are untouched.
        assert_eq!(inputs["prompt"], "Answer: {{memory.user_prompt}}");
    }

    #[tokio::test]
    async fn test_run_summary() {
        let mut manager = MemoryManager::new(InMemoryStore::new());
        let run_id = manager
            .start_run("research", &params(Some("q")))
            .await
            .unwrap();
        manager
            .save_step_result("draft", &json!({"output": "text"}))
            .await
            .unwrap();
        manager
            .save_step_result("review", &json!({"output": "better text"}))
            .await
            .unwrap();

        let summary = manager.run_summary(&run_id).await.unwrap();
        assert_eq!(summary.entry_count, 4);
        assert_eq!(summary.step_names, vec!["draft", "review"]);
        assert!(summary.has_user_prompt);
        assert_eq!(summary.by_classification["output"], 2);
        assert!(summary.started_at.is_some());
    }
}

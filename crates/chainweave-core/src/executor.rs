//! Workflow executor: the sequential state machine that drives a run.
//!
//! A run moves through `Initialized -> Validating -> Running` and ends in
//! exactly one of `Completed`, `Aborted`, or `HaltedAtGate`. Steps execute
//! strictly in order; each regular step fetches its memory context, gets
//! memory variables injected, has its inputs resolved, dispatches to its
//! tool, and persists its result before the next step starts. Gate steps
//! ask the [`ApprovalGate`] instead of running a tool; a rejection is a
//! deliberate halt, not a failure.
//!
//! Failure handling is per step: `abort_chain` ends the run with partial
//! outputs, `continue` records `{"error": ...}` as the step's output and
//! moves on. Memory store failures are always fatal.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use chainweave_types::error::{StoreError, ToolError};
use chainweave_types::workflow::{FailurePolicy, StepDefinition, WorkflowDefinition};

use crate::config::{DispatchMode, EngineConfig};
use crate::definition::{normalize_params, validate_params};
use crate::memory::{MemoryError, MemoryManager, MemoryStore};
use crate::template::{resolve_template, resolve_value};
use crate::tool::ToolRegistry;

// ---------------------------------------------------------------------------
// States and results
// ---------------------------------------------------------------------------

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Initialized,
    Validating,
    Running,
    Completed,
    Aborted,
    HaltedAtGate,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Initialized => write!(f, "initialized"),
            RunState::Validating => write!(f, "validating"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Aborted => write!(f, "aborted"),
            RunState::HaltedAtGate => write!(f, "halted_at_gate"),
        }
    }
}

/// Outcome of a run. `state` is always terminal.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub run_id: String,
    pub state: RunState,
    /// Step outputs accumulated up to the point the run ended.
    pub outputs: Map<String, Value>,
    /// Failure message when `state` is [`RunState::Aborted`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Gate step name when `state` is [`RunState::HaltedAtGate`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<String>,
}

/// Fatal executor errors. Step failures are not errors -- they flow into
/// the run outcome through the step's failure policy.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("memory store failure: {0}")]
    Store(#[from] StoreError),

    #[error("memory manager failure: {0}")]
    Memory(#[from] MemoryError),

    #[error("approval gate failure: {0}")]
    Gate(String),
}

// ---------------------------------------------------------------------------
// Approval gate
// ---------------------------------------------------------------------------

/// Decides whether a gate step may pass.
///
/// The CLI implements this with an interactive confirmation; tests use
/// scripted verdicts. Uses native async fn in traits (RPITIT).
pub trait ApprovalGate: Send + Sync {
    /// Present the resolved gate prompt and return the verdict.
    fn approve(
        &self,
        step_name: &str,
        prompt: &str,
    ) -> impl std::future::Future<Output = std::io::Result<bool>> + Send;
}

/// Gate that approves everything. For non-interactive runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl ApprovalGate for AutoApprove {
    async fn approve(&self, _step_name: &str, _prompt: &str) -> std::io::Result<bool> {
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

enum StepOutcome {
    Success(Value),
    /// Step failed; the step's failure policy decides what happens.
    Failed(String),
    /// Configuration problem; aborts the run regardless of policy.
    ConfigError(String),
}

/// Drives workflow runs against a tool registry, a memory manager, and an
/// approval gate.
pub struct WorkflowExecutor<S: MemoryStore, G: ApprovalGate> {
    registry: ToolRegistry,
    memory: MemoryManager<S>,
    gate: G,
    config: Arc<EngineConfig>,
}

impl<S: MemoryStore, G: ApprovalGate> WorkflowExecutor<S, G> {
    pub fn new(
        registry: ToolRegistry,
        memory: MemoryManager<S>,
        gate: G,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            registry,
            memory,
            gate,
            config,
        }
    }

    /// The memory manager (and through it, the store).
    pub fn memory(&self) -> &MemoryManager<S> {
        &self.memory
    }

    /// Execute a workflow with the provided parameters.
    ///
    /// Returns `Err` only for fatal conditions (store failures, a broken
    /// gate); every other ending is a terminal [`ExecutionResult`].
    pub async fn execute(
        &mut self,
        workflow_name: &str,
        workflow: &WorkflowDefinition,
        provided: &Map<String, Value>,
    ) -> Result<ExecutionResult, ExecutorError> {
        tracing::info!(workflow = workflow_name, state = %RunState::Initialized, "run initialized");

        // The run exists in memory before validation, so a validation
        // failure still leaves the run-initiation slices behind.
        let run_id = self.memory.start_run(workflow_name, provided).await?;

        tracing::debug!(run_id = %run_id, state = %RunState::Validating, "validating parameters");
        let descriptors = normalize_params(&workflow.params);
        let params = match validate_params(workflow_name, &descriptors, provided) {
            Ok(params) => params,
            Err(e) => {
                tracing::warn!(run_id = %run_id, error = %e, "parameter validation failed");
                return Ok(ExecutionResult {
                    run_id,
                    state: RunState::Aborted,
                    outputs: Map::new(),
                    error: Some(e.to_string()),
                    halted_at: None,
                });
            }
        };

        tracing::info!(run_id = %run_id, state = %RunState::Running, steps = workflow.steps.len(), "run started");
        let mut step_outputs: Map<String, Value> = Map::new();

        for step in &workflow.steps {
            let outcome = if let Some(gate_spec) = &step.gate {
                let template = gate_spec
                    .prompt
                    .clone()
                    .unwrap_or_else(|| format!("Approve step '{}'?", step.name));
                match resolve_template(&template, &params, &step_outputs) {
                    Ok(prompt) => {
                        let approved = self
                            .gate
                            .approve(&step.name, &prompt)
                            .await
                            .map_err(|e| ExecutorError::Gate(e.to_string()))?;
                        if approved {
                            tracing::info!(run_id = %run_id, step = %step.name, "gate approved");
                            continue;
                        }
                        tracing::warn!(run_id = %run_id, step = %step.name, "gate rejected, halting run");
                        return Ok(ExecutionResult {
                            run_id,
                            state: RunState::HaltedAtGate,
                            outputs: step_outputs,
                            error: None,
                            halted_at: Some(step.name.clone()),
                        });
                    }
                    Err(e) => StepOutcome::Failed(e.to_string()),
                }
            } else {
                self.run_step(step, &params, &step_outputs).await
            };

            match outcome {
                StepOutcome::Success(result) => {
                    self.memory.save_step_result(&step.name, &result).await?;
                    step_outputs.insert(step.name.clone(), result);
                    tracing::info!(run_id = %run_id, step = %step.name, "step completed");
                }
                StepOutcome::ConfigError(message) => {
                    tracing::error!(run_id = %run_id, step = %step.name, error = %message, "aborting run on configuration error");
                    return Ok(ExecutionResult {
                        run_id,
                        state: RunState::Aborted,
                        outputs: step_outputs,
                        error: Some(message),
                        halted_at: None,
                    });
                }
                StepOutcome::Failed(message) => {
                    let described = format!("Step '{}' failed: {message}", step.name);
                    match step.on_failure {
                        FailurePolicy::AbortChain => {
                            tracing::error!(run_id = %run_id, step = %step.name, error = %message, "aborting run on step failure");
                            return Ok(ExecutionResult {
                                run_id,
                                state: RunState::Aborted,
                                outputs: step_outputs,
                                error: Some(described),
                                halted_at: None,
                            });
                        }
                        FailurePolicy::Continue => {
                            tracing::warn!(run_id = %run_id, step = %step.name, error = %message, "continuing past step failure");
                            step_outputs
                                .insert(step.name.clone(), json!({"error": message}));
                        }
                    }
                }
            }
        }

        tracing::info!(run_id = %run_id, state = %RunState::Completed, "run completed");
        Ok(ExecutionResult {
            run_id,
            state: RunState::Completed,
            outputs: step_outputs,
            error: None,
            halted_at: None,
        })
    }

    async fn run_step(
        &self,
        step: &StepDefinition,
        params: &Map<String, Value>,
        step_outputs: &Map<String, Value>,
    ) -> StepOutcome {
        let context = self.memory.fetch_context(step).await;
        if !context.is_empty() {
            tracing::debug!(
                step = %step.name,
                variables = ?context.keys().collect::<Vec<_>>(),
                "memory context loaded"
            );
        }
        let injected = self.memory.inject_context(&step.inputs, &context);

        let resolved = match resolve_value(&Value::Object(injected), params, step_outputs) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return StepOutcome::Failed("resolved inputs were not a map".to_string()),
            Err(e) => return StepOutcome::Failed(e.to_string()),
        };

        match self.registry.get(&step.tool) {
            Some(tool) => match tool.execute(&resolved).await {
                Ok(result) => StepOutcome::Success(result),
                Err(e) => StepOutcome::Failed(e.to_string()),
            },
            None => match self.config.dispatch_mode() {
                DispatchMode::Simulate => {
                    tracing::warn!(step = %step.name, tool = %step.tool, "unknown tool, simulating output");
                    StepOutcome::Success(json!({
                        "output": format!("[Simulated output from unknown tool: {}]", step.tool),
                        "inputs": Value::Object(resolved),
                        "simulated": true,
                    }))
                }
                DispatchMode::Strict => {
                    StepOutcome::ConfigError(ToolError::UnknownTool(step.tool.clone()).to_string())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::tool::Tool;
    use chainweave_types::memory::Classification;
    use chainweave_types::workflow::{GateSpec, MemorySpec, ParamListEntry, ParamsSection};
    use std::sync::Mutex;

    struct EchoTool;

    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(&self, inputs: &Map<String, Value>) -> Result<Value, ToolError> {
            let prompt = inputs
                .get("prompt")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::MissingInputs {
                    tool: "echo".to_string(),
                    missing: vec!["prompt".to_string()],
                })?;
            Ok(json!({"output": format!("echo: {prompt}")}))
        }
    }

    struct FailTool;

    impl Tool for FailTool {
        fn name(&self) -> &str {
            "fail"
        }

        async fn execute(&self, _inputs: &Map<String, Value>) -> Result<Value, ToolError> {
            Err(ToolError::Execution("deliberate failure".to_string()))
        }
    }

    struct ScriptedGate {
        verdict: bool,
        seen_prompt: Arc<Mutex<Option<String>>>,
    }

    impl ScriptedGate {
        fn new(verdict: bool) -> Self {
            Self {
                verdict,
                seen_prompt: Arc::new(Mutex::new(None)),
            }
        }
    }

    impl ApprovalGate for ScriptedGate {
        async fn approve(&self, _step_name: &str, prompt: &str) -> std::io::Result<bool> {
            *self.seen_prompt.lock().unwrap() = Some(prompt.to_string());
            Ok(self.verdict)
        }
    }

    fn echo_step(name: &str, prompt: &str) -> StepDefinition {
        let Value::Object(inputs) = json!({"prompt": prompt}) else {
            unreachable!()
        };
        StepDefinition {
            name: name.to_string(),
            tool: "echo".to_string(),
            inputs,
            memory: MemorySpec::default(),
            gate: None,
            on_failure: FailurePolicy::AbortChain,
        }
    }

    fn fail_step(name: &str, on_failure: FailurePolicy) -> StepDefinition {
        StepDefinition {
            name: name.to_string(),
            tool: "fail".to_string(),
            inputs: Map::new(),
            memory: MemorySpec::default(),
            gate: None,
            on_failure,
        }
    }

    fn gate_step(name: &str, prompt: Option<&str>) -> StepDefinition {
        StepDefinition {
            name: name.to_string(),
            tool: "gate".to_string(),
            inputs: Map::new(),
            memory: MemorySpec::default(),
            gate: Some(GateSpec {
                prompt: prompt.map(str::to_string),
            }),
            on_failure: FailurePolicy::AbortChain,
        }
    }

    fn workflow(required: &[&str], steps: Vec<StepDefinition>) -> WorkflowDefinition {
        WorkflowDefinition {
            params: ParamsSection::List(
                required
                    .iter()
                    .map(|name| ParamListEntry::Name(name.to_string()))
                    .collect(),
            ),
            steps,
        }
    }

    fn executor(
        mode: DispatchMode,
        gate: ScriptedGate,
    ) -> WorkflowExecutor<InMemoryStore, ScriptedGate> {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(FailTool);
        WorkflowExecutor::new(
            registry,
            MemoryManager::new(InMemoryStore::new()),
            gate,
            Arc::new(EngineConfig::with_dispatch_mode(mode)),
        )
    }

    fn provided(entries: &[(&str, &str)]) -> Map<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[tokio::test]
    async fn test_sequential_resolution_across_steps() {
        let mut exec = executor(DispatchMode::Strict, ScriptedGate::new(true));
        let wf = workflow(
            &["user_prompt"],
            vec![
                echo_step("one", "{{params.user_prompt}}"),
                echo_step("two", "again: {{steps.one.output}}"),
            ],
        );

        let result = exec
            .execute("chain", &wf, &provided(&[("user_prompt", "alpha")]))
            .await
            .unwrap();

        assert_eq!(result.state, RunState::Completed);
        assert_eq!(result.outputs["one"]["output"], "echo: alpha");
        assert_eq!(result.outputs["two"]["output"], "echo: again: echo: alpha");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_validation_failure_leaves_only_initiation_slices() {
        let mut exec = executor(DispatchMode::Strict, ScriptedGate::new(true));
        let wf = workflow(&["user_prompt"], vec![echo_step("one", "hi")]);

        let result = exec.execute("chain", &wf, &Map::new()).await.unwrap();

        assert_eq!(result.state, RunState::Aborted);
        assert!(result.error.as_deref().unwrap().contains("user_prompt"));
        assert!(result.outputs.is_empty());

        // No user_prompt param was provided, so the run recorded exactly
        // one slice: the parameters record. No step ever wrote anything.
        let history = exec.memory().store().history(&result.run_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].classification, Classification::Parameters);
    }

    #[tokio::test]
    async fn test_continue_policy_records_error_and_proceeds() {
        let mut exec = executor(DispatchMode::Strict, ScriptedGate::new(true));
        let mut downstream = echo_step("after", "{{steps.broken.output}}");
        downstream.on_failure = FailurePolicy::Continue;
        let wf = workflow(
            &[],
            vec![
                fail_step("broken", FailurePolicy::Continue),
                downstream,
                echo_step("last", "plain"),
            ],
        );

        let result = exec.execute("chain", &wf, &Map::new()).await.unwrap();

        assert_eq!(result.state, RunState::Completed);
        assert!(
            result.outputs["broken"]["error"]
                .as_str()
                .unwrap()
                .contains("deliberate failure")
        );
        // The stored error map has no `output` key, so the downstream
        // reference fails resolution -- and its own continue policy
        // records that failure too.
        assert!(
            result.outputs["after"]["error"]
                .as_str()
                .unwrap()
                .contains("steps.broken.output")
        );
        assert_eq!(result.outputs["last"]["output"], "echo: plain");

        // Only successful steps persisted output slices.
        let history = exec.memory().store().history(&result.run_id).await.unwrap();
        let output_steps: Vec<&str> = history
            .iter()
            .filter(|s| s.classification == Classification::Output)
            .map(|s| s.step_name.as_str())
            .collect();
        assert_eq!(output_steps, vec!["last"]);
    }

    #[tokio::test]
    async fn test_abort_chain_returns_partial_outputs() {
        let mut exec = executor(DispatchMode::Strict, ScriptedGate::new(true));
        let wf = workflow(
            &[],
            vec![
                echo_step("one", "hello"),
                fail_step("broken", FailurePolicy::AbortChain),
                echo_step("never", "unreached"),
            ],
        );

        let result = exec.execute("chain", &wf, &Map::new()).await.unwrap();

        assert_eq!(result.state, RunState::Aborted);
        let error = result.error.as_deref().unwrap();
        assert!(error.contains("Step 'broken' failed"), "got: {error}");
        assert!(result.outputs.contains_key("one"));
        assert!(!result.outputs.contains_key("never"));
    }

    #[tokio::test]
    async fn test_gate_rejection_halts_without_error() {
        let mut exec = executor(DispatchMode::Strict, ScriptedGate::new(false));
        let wf = workflow(
            &[],
            vec![
                echo_step("one", "hello"),
                gate_step("checkpoint", None),
                echo_step("after", "unreached"),
            ],
        );

        let result = exec.execute("chain", &wf, &Map::new()).await.unwrap();

        assert_eq!(result.state, RunState::HaltedAtGate);
        assert_eq!(result.halted_at.as_deref(), Some("checkpoint"));
        assert!(result.error.is_none());
        assert!(result.outputs.contains_key("one"));
        assert!(!result.outputs.contains_key("after"));
    }

    #[tokio::test]
    async fn test_gate_approval_continues_without_output() {
        let mut exec = executor(DispatchMode::Strict, ScriptedGate::new(true));
        let wf = workflow(
            &[],
            vec![gate_step("checkpoint", None), echo_step("after", "onward")],
        );

        let result = exec.execute("chain", &wf, &Map::new()).await.unwrap();

        assert_eq!(result.state, RunState::Completed);
        // Gate steps produce no output entry.
        assert!(!result.outputs.contains_key("checkpoint"));
        assert_eq!(result.outputs["after"]["output"], "echo: onward");
    }

    #[tokio::test]
    async fn test_gate_prompt_is_resolved() {
        let gate = ScriptedGate::new(true);
        let seen = Arc::clone(&gate.seen_prompt);
        let mut exec = executor(DispatchMode::Strict, gate);
        let wf = workflow(
            &[],
            vec![
                echo_step("one", "alpha"),
                gate_step("checkpoint", Some("Ship {{steps.one.output}}?")),
            ],
        );

        exec.execute("chain", &wf, &Map::new()).await.unwrap();

        assert_eq!(
            seen.lock().unwrap().as_deref(),
            Some("Ship echo: alpha?")
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_strict_aborts_despite_continue_policy() {
        let mut exec = executor(DispatchMode::Strict, ScriptedGate::new(true));
        let mut ghost = echo_step("ghost", "hi");
        ghost.tool = "nonexistent".to_string();
        ghost.on_failure = FailurePolicy::Continue;
        let wf = workflow(&[], vec![ghost]);

        let result = exec.execute("chain", &wf, &Map::new()).await.unwrap();

        assert_eq!(result.state, RunState::Aborted);
        assert!(
            result
                .error
                .as_deref()
                .unwrap()
                .contains("no tool registered for 'nonexistent'")
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_simulate_mode_produces_flagged_output() {
        let mut exec = executor(DispatchMode::Simulate, ScriptedGate::new(true));
        let mut ghost = echo_step("ghost", "hi");
        ghost.tool = "nonexistent".to_string();
        let wf = workflow(&[], vec![ghost]);

        let result = exec.execute("chain", &wf, &Map::new()).await.unwrap();

        assert_eq!(result.state, RunState::Completed);
        assert_eq!(
            result.outputs["ghost"]["output"],
            "[Simulated output from unknown tool: nonexistent]"
        );
        assert_eq!(result.outputs["ghost"]["simulated"], true);
    }

    #[tokio::test]
    async fn test_memory_context_flows_between_steps() {
        let mut exec = executor(DispatchMode::Strict, ScriptedGate::new(true));
        let mut consumer = echo_step("consumer", "recall: {{memory.one_output}}");
        consumer.memory = MemorySpec {
            needs: vec!["tool_output(one)".to_string()],
        };
        let wf = workflow(
            &["user_prompt"],
            vec![echo_step("one", "{{params.user_prompt}}"), consumer],
        );

        let result = exec
            .execute("chain", &wf, &provided(&[("user_prompt", "alpha")]))
            .await
            .unwrap();

        assert_eq!(result.state, RunState::Completed);
        assert_eq!(
            result.outputs["consumer"]["output"],
            "echo: recall: echo: alpha"
        );
    }

    #[tokio::test]
    async fn test_run_records_user_prompt_slice() {
        let mut exec = executor(DispatchMode::Strict, ScriptedGate::new(true));
        let wf = workflow(&["user_prompt"], vec![echo_step("one", "hi")]);

        let result = exec
            .execute("chain", &wf, &provided(&[("user_prompt", "the question")]))
            .await
            .unwrap();

        let history = exec.memory().store().history(&result.run_id).await.unwrap();
        assert!(
            history
                .iter()
                .any(|s| s.classification == Classification::UserPrompt
                    && s.content == "the question")
        );
        assert!(result.run_id.starts_with("chain_"));
    }
}

//! The `cweave run` command: load config, build the engine, execute.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Confirm;
use serde_json::{Map, Value};

use chainweave_core::config::{DispatchMode, EngineConfig};
use chainweave_core::definition::parse_config_yaml;
use chainweave_core::executor::{ApprovalGate, ExecutionResult, RunState, WorkflowExecutor};
use chainweave_core::memory::MemoryManager;
use chainweave_core::tool::{ModelCallTool, ParallelQueryTool, ToolRegistry, model_call::MODEL_CALL};
use chainweave_infra::llm::HttpClientFactory;
use chainweave_infra::secret::EnvKeySource;
use chainweave_types::workflow::WorkflowDefinition;

use crate::state::AppState;

/// Interactive approval gate backed by dialoguer.
///
/// With `assume_yes` every gate passes without prompting, matching the
/// `--yes` flag.
struct ConsoleGate {
    assume_yes: bool,
}

impl ApprovalGate for ConsoleGate {
    async fn approve(&self, step_name: &str, prompt: &str) -> std::io::Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }

        println!();
        println!(
            "  {} Gate before step '{}'",
            style("⏸").yellow().bold(),
            style(step_name).cyan()
        );

        Confirm::new()
            .with_prompt(format!("  {prompt}"))
            .default(false)
            .interact()
            .map_err(std::io::Error::other)
    }
}

/// Execute a workflow end to end and print the outcome.
pub async fn run_workflow(
    state: &AppState,
    workflow_name: &str,
    raw_params: &[String],
    config_path: &str,
    yes: bool,
    simulate_unknown_tools: bool,
    json: bool,
) -> Result<()> {
    let yaml = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read config file '{config_path}'"))?;
    let config_file = parse_config_yaml(&yaml)?;

    let Some(workflow) = config_file.workflows.get(workflow_name) else {
        bail!(
            "unknown workflow '{}' (available: {})",
            workflow_name,
            config_file
                .workflows
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
    };

    let workflow = match &config_file.main_llm {
        Some(defaults) => apply_model_defaults(workflow, defaults),
        None => workflow.clone(),
    };

    let mut params = Map::new();
    for raw in raw_params {
        let (key, value) = parse_param(raw)?;
        params.insert(key, value);
    }

    let dispatch_mode = if simulate_unknown_tools {
        DispatchMode::Simulate
    } else {
        DispatchMode::Strict
    };
    let engine_config = Arc::new(EngineConfig::with_dispatch_mode(dispatch_mode));

    let model_call = ModelCallTool::new(
        Arc::clone(&engine_config),
        Arc::new(EnvKeySource::new()),
        Arc::new(HttpClientFactory::new()),
    );
    let mut registry = ToolRegistry::new();
    registry.register(model_call.clone());
    registry.register(ParallelQueryTool::new(
        Arc::new(model_call),
        engine_config.max_parallel_queries(),
    ));

    let memory = MemoryManager::new(state.store.clone());
    let gate = ConsoleGate { assume_yes: yes };
    let mut executor = WorkflowExecutor::new(registry, memory, gate, engine_config);

    if !json {
        println!();
        println!(
            "  {} Running workflow '{}' ({} step{})",
            style("⚡").bold(),
            style(workflow_name).cyan(),
            workflow.steps.len(),
            if workflow.steps.len() == 1 { "" } else { "s" }
        );
    }

    let result = executor.execute(workflow_name, &workflow, &params).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_result(&result);
    Ok(())
}

fn print_result(result: &ExecutionResult) {
    println!();
    match result.state {
        RunState::Completed => {
            println!("  {} Run completed", style("✓").green().bold());
        }
        RunState::HaltedAtGate => {
            let step = result.halted_at.as_deref().unwrap_or("?");
            println!(
                "  {} Run halted at gate '{}'",
                style("⏸").yellow().bold(),
                step
            );
        }
        _ => {
            println!("  {} Run aborted", style("✗").red().bold());
            if let Some(error) = &result.error {
                println!("    {}", style(error).red());
            }
        }
    }
    println!("  Run id: {}", style(&result.run_id).dim());

    if result.outputs.is_empty() {
        println!();
        return;
    }

    let mut table = comfy_table::Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
    table.set_header(vec!["Step", "Output"]);
    for (step, value) in &result.outputs {
        table.add_row(vec![step.clone(), preview(value, 80)]);
    }
    println!();
    println!("{table}");
    println!();
}

/// Short single-line preview of a step output value.
fn preview(value: &Value, max: usize) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("output") {
            Some(Value::String(s)) => s.clone(),
            _ => value.to_string(),
        },
        _ => value.to_string(),
    };
    let flat = text.replace('\n', " ");
    if flat.chars().count() > max {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

/// Parse a `key=value` parameter. Values that parse as JSON are passed
/// structured, anything else is a string.
fn parse_param(raw: &str) -> Result<(String, Value)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("invalid parameter '{raw}' (expected key=value)");
    };
    let parsed = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), parsed))
}

/// Fill missing `provider`/`model` inputs of model-call steps from the
/// config's `main_llm` defaults.
fn apply_model_defaults(
    workflow: &WorkflowDefinition,
    defaults: &std::collections::BTreeMap<String, String>,
) -> WorkflowDefinition {
    let mut workflow = workflow.clone();
    for step in &mut workflow.steps {
        if step.tool != MODEL_CALL {
            continue;
        }
        for field in ["provider", "model"] {
            if !step.inputs.contains_key(field) {
                if let Some(default) = defaults.get(field) {
                    step.inputs
                        .insert(field.to_string(), Value::String(default.clone()));
                }
            }
        }
    }
    workflow
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param_string() {
        let (key, value) = parse_param("topic=rust async").unwrap();
        assert_eq!(key, "topic");
        assert_eq!(value, Value::String("rust async".to_string()));
    }

    #[test]
    fn test_parse_param_json() {
        let (_, value) = parse_param("count=3").unwrap();
        assert_eq!(value, serde_json::json!(3));
        let (_, value) = parse_param(r#"tags=["a","b"]"#).unwrap();
        assert_eq!(value, serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_parse_param_rejects_missing_equals() {
        assert!(parse_param("topic").is_err());
    }

    #[test]
    fn test_apply_model_defaults() {
        let yaml = r#"
workflows:
  demo:
    steps:
      - name: draft
        tool: model_call
        inputs:
          prompt: "hi"
      - name: pinned
        tool: model_call
        inputs:
          provider: gemini
          model: gemini-2.0-flash
          prompt: "hi"
"#;
        let config = parse_config_yaml(yaml).unwrap();
        let mut defaults = std::collections::BTreeMap::new();
        defaults.insert("provider".to_string(), "anthropic".to_string());
        defaults.insert("model".to_string(), "claude-sonnet-4-20250514".to_string());

        let workflow = apply_model_defaults(&config.workflows["demo"], &defaults);
        assert_eq!(workflow.steps[0].inputs["provider"], "anthropic");
        assert_eq!(workflow.steps[0].inputs["model"], "claude-sonnet-4-20250514");
        // Explicit inputs win over defaults.
        assert_eq!(workflow.steps[1].inputs["provider"], "gemini");
    }

    #[test]
    fn test_example_config_gate_steps_stand_alone() {
        let yaml = include_str!("../../../../chainweave.example.yaml");
        let config = parse_config_yaml(yaml).unwrap();

        let research = &config.workflows["research"];
        assert_eq!(research.steps.len(), 3);
        // The gate step carries no inputs; tool execution is skipped on
        // approval, so any inputs there would be dead config.
        assert!(research.steps[1].gate.is_some());
        assert!(research.steps[1].inputs.is_empty());
        assert!(research.steps[2].gate.is_none());
        assert!(research.steps[2].inputs.contains_key("prompt"));
    }

    #[test]
    fn test_preview_truncates() {
        let long = Value::String("x".repeat(200));
        let shown = preview(&long, 80);
        assert_eq!(shown.chars().count(), 83);
        assert!(shown.ends_with("..."));
    }
}

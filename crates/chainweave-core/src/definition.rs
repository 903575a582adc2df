//! Workflow definition loading: YAML parsing, structural validation, and
//! parameter schema normalization.
//!
//! Two legacy parameter formats are accepted (see
//! [`chainweave_types::workflow::ParamsSection`]) and normalized once at
//! load time into canonical [`ParamDescriptor`]s. Everything downstream of
//! this module works only with the canonical form.

use serde_json::{Map, Value};
use thiserror::Error;

use chainweave_types::error::ValidationError;
use chainweave_types::workflow::{
    EngineConfigFile, ParamDescriptor, ParamListEntry, ParamsSection, WorkflowDefinition,
};

/// Errors from loading a workflow configuration.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("invalid YAML: {0}")]
    Parse(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Parse and validate a top-level configuration file.
pub fn parse_config_yaml(yaml: &str) -> Result<EngineConfigFile, DefinitionError> {
    let config: EngineConfigFile =
        serde_yaml_ng::from_str(yaml).map_err(|e| DefinitionError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Structural validation of every workflow in a config.
///
/// Checks: at least one step per workflow, unique step names, non-empty
/// tool ids. Parameter presence is checked later, at run start, against
/// the actually provided values.
pub fn validate_config(config: &EngineConfigFile) -> Result<(), ValidationError> {
    for (name, workflow) in &config.workflows {
        validate_workflow(name, workflow)?;
    }
    Ok(())
}

fn validate_workflow(name: &str, workflow: &WorkflowDefinition) -> Result<(), ValidationError> {
    if workflow.steps.is_empty() {
        return Err(ValidationError::EmptyWorkflow {
            workflow: name.to_string(),
        });
    }

    let mut seen = std::collections::HashSet::new();
    for step in &workflow.steps {
        if !seen.insert(step.name.as_str()) {
            return Err(ValidationError::DuplicateStep {
                workflow: name.to_string(),
                step: step.name.clone(),
            });
        }
        if step.tool.trim().is_empty() {
            return Err(ValidationError::EmptyTool {
                workflow: name.to_string(),
                step: step.name.clone(),
            });
        }
    }

    Ok(())
}

/// Normalize a parameter schema into canonical descriptors.
///
/// List format: a bare name is required with no default; a `name: "text"`
/// entry is optional with that default; a `name: {required, default, ...}`
/// entry follows its spec, where `required` defaults to true. Map format
/// entries follow their [`ParamSpec`], where `required` defaults to false.
/// The asymmetric defaults match the formats' historical behavior.
pub fn normalize_params(section: &ParamsSection) -> Vec<ParamDescriptor> {
    match section {
        ParamsSection::List(entries) => entries
            .iter()
            .flat_map(|entry| match entry {
                ParamListEntry::Name(name) => vec![ParamDescriptor {
                    name: name.clone(),
                    required: true,
                    default: None,
                    description: None,
                }],
                ParamListEntry::Entry(map) => map
                    .iter()
                    .map(|(name, value)| descriptor_from_list_value(name, value))
                    .collect(),
            })
            .collect(),
        ParamsSection::Map(specs) => specs
            .iter()
            .map(|(name, spec)| ParamDescriptor {
                name: name.clone(),
                required: spec.required,
                default: spec.default.clone(),
                description: spec.description.clone(),
            })
            .collect(),
    }
}

fn descriptor_from_list_value(name: &str, value: &Value) -> ParamDescriptor {
    match value {
        Value::Object(spec) => {
            let required = spec
                .get("required")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            ParamDescriptor {
                name: name.to_string(),
                required,
                default: if required {
                    None
                } else {
                    spec.get("default").cloned()
                },
                description: spec
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }
        }
        // Any scalar is a plain default value.
        other => ParamDescriptor {
            name: name.to_string(),
            required: false,
            default: Some(other.clone()),
            description: None,
        },
    }
}

/// Validate provided parameters against descriptors and merge in defaults.
///
/// Fails when any required parameter is missing. Optional parameters not
/// provided take their default (null when the spec has none); provided
/// values always win over defaults.
pub fn validate_params(
    workflow_name: &str,
    descriptors: &[ParamDescriptor],
    provided: &Map<String, Value>,
) -> Result<Map<String, Value>, ValidationError> {
    let missing: Vec<String> = descriptors
        .iter()
        .filter(|d| d.required && !provided.contains_key(&d.name))
        .map(|d| d.name.clone())
        .collect();

    if !missing.is_empty() {
        return Err(ValidationError::MissingParams {
            workflow: workflow_name.to_string(),
            missing,
        });
    }

    let mut merged = Map::new();
    for descriptor in descriptors {
        if !descriptor.required && !provided.contains_key(&descriptor.name) {
            merged.insert(
                descriptor.name.clone(),
                descriptor.default.clone().unwrap_or(Value::Null),
            );
        }
    }
    for (key, value) in provided {
        merged.insert(key.clone(), value.clone());
    }

    Ok(merged)
}

/// Introspection record for one workflow, as shown by listings.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WorkflowInfo {
    pub name: String,
    pub step_count: usize,
    pub step_names: Vec<String>,
    pub params: Vec<ParamDescriptor>,
}

/// Enumerate all workflows in a config with their shapes.
pub fn list_workflows(config: &EngineConfigFile) -> Vec<WorkflowInfo> {
    config
        .workflows
        .iter()
        .map(|(name, workflow)| WorkflowInfo {
            name: name.clone(),
            step_count: workflow.steps.len(),
            step_names: workflow.steps.iter().map(|s| s.name.clone()).collect(),
            params: normalize_params(&workflow.params),
        })
        .collect()
}

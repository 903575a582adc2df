//! Model call tool: dispatches a single prompt to an LLM provider.
//!
//! Validates provider/model/prompt against the immutable engine config,
//! resolves a credential through the [`KeySource`], and queries the
//! provider through the [`ClientFactory`]. When no credential resolves or
//! the provider call fails, the tool degrades to a clearly flagged
//! simulated response instead of failing the step.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use chainweave_types::error::ToolError;
use chainweave_types::llm::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, ModelSpec};

use crate::config::EngineConfig;
use crate::llm::ClientFactory;
use crate::secret::KeySource;

use super::Tool;

/// Tool id for [`ModelCallTool`].
pub const MODEL_CALL: &str = "model_call";

/// Tool for making a single LLM provider call.
///
/// Required inputs: `provider`, `model`, `prompt`.
/// Optional inputs: `max_tokens`, `temperature`.
#[derive(Clone)]
pub struct ModelCallTool {
    config: Arc<EngineConfig>,
    keys: Arc<dyn KeySource>,
    clients: Arc<dyn ClientFactory>,
}

impl ModelCallTool {
    pub fn new(
        config: Arc<EngineConfig>,
        keys: Arc<dyn KeySource>,
        clients: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            config,
            keys,
            clients,
        }
    }

    fn validate(&self, inputs: &Map<String, Value>) -> Result<(String, String, String), ToolError> {
        let missing: Vec<String> = ["provider", "model", "prompt"]
            .iter()
            .filter(|field| !inputs.contains_key(**field))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::MissingInputs {
                tool: MODEL_CALL.to_string(),
                missing,
            });
        }

        let field = |name: &str| -> Result<String, ToolError> {
            inputs
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ToolError::InvalidInput {
                    tool: MODEL_CALL.to_string(),
                    message: format!("'{name}' must be a string"),
                })
        };

        let provider = field("provider")?.to_lowercase();
        let model = field("model")?;
        let prompt = field("prompt")?;

        if !self.config.supports_provider(&provider) {
            return Err(ToolError::UnsupportedProvider {
                provider,
                supported: self.config.providers().map(str::to_string).collect(),
            });
        }

        Ok((provider, model, prompt))
    }

    fn model_spec(&self, model: String, inputs: &Map<String, Value>) -> ModelSpec {
        ModelSpec {
            model,
            max_tokens: inputs
                .get("max_tokens")
                .and_then(Value::as_u64)
                .map(|n| n as u32)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: inputs
                .get("temperature")
                .and_then(Value::as_f64)
                .unwrap_or(DEFAULT_TEMPERATURE),
        }
    }
}

impl Tool for ModelCallTool {
    fn name(&self) -> &str {
        MODEL_CALL
    }

    async fn execute(&self, inputs: &Map<String, Value>) -> Result<Value, ToolError> {
        let (provider, model, prompt) = self.validate(inputs)?;
        let spec = self.model_spec(model.clone(), inputs);

        tracing::debug!(provider = %provider, model = %model, "dispatching model call");

        let Some(api_key) = self.keys.api_key(&provider) else {
            tracing::warn!(provider = %provider, "no API key available, simulating response");
            return Ok(simulated_response(&provider, &model, &prompt, None));
        };

        let client = match self.clients.client(&provider, api_key, &spec) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(provider = %provider, error = %e, "client construction failed, simulating response");
                return Ok(simulated_response(&provider, &model, &prompt, Some(&e.to_string())));
            }
        };

        match client.query(&prompt).await {
            Ok(text) => {
                tracing::info!(provider = %provider, model = %model, "received provider response");
                let token_count = text.split_whitespace().count();
                Ok(json!({
                    "output": text,
                    "provider": provider,
                    "model": model,
                    "simulated": false,
                    "token_count": token_count,
                }))
            }
            Err(e) => {
                tracing::warn!(provider = %provider, model = %model, error = %e, "provider call failed, simulating response");
                Ok(simulated_response(&provider, &model, &prompt, Some(&e.to_string())))
            }
        }
    }
}

/// Build the flagged fallback response. `error` distinguishes a failed
/// provider call from a missing credential.
fn simulated_response(provider: &str, model: &str, prompt: &str, error: Option<&str>) -> Value {
    let preview: String = prompt.chars().take(50).collect();
    let output = match error {
        Some(_) => format!("[SIMULATED {provider}/{model} - API Error] Response to: {preview}..."),
        None => format!("[SIMULATED {provider}/{model}] Response to: {preview}..."),
    };

    let mut result = json!({
        "output": output,
        "provider": provider,
        "model": model,
        "simulated": true,
    });
    if let (Some(error), Some(map)) = (error, result.as_object_mut()) {
        map.insert("error".to_string(), Value::String(error.to_string()));
    }
    result
}

//! LLM model spec and error types for Chainweave.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default max tokens applied when a step omits `max_tokens`.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Default sampling temperature applied when a step omits `temperature`.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Settings for a single model invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

impl ModelSpec {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Errors from LLM provider clients.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("rate limited")]
    RateLimited,

    #[error("no API key available for provider '{0}'")]
    MissingKey(String),

    #[error("unknown provider: '{0}'")]
    UnknownProvider(String),

    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("failed to parse provider response: {0}")]
    Deserialization(String),
}

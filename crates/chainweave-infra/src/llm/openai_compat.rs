//! OpenAI-compatible chat completions client.
//!
//! A single [`OpenAiCompatClient`] serves DeepSeek and Mistral -- both
//! speak the `/chat/completions` protocol, so one codebase covers them
//! via configurable base URLs and factory functions.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use chainweave_core::llm::LlmClient;
use chainweave_types::llm::{LlmError, ModelSpec};

use super::http_client;

/// Unified client for any OpenAI-compatible chat completions API.
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    provider_name: String,
    spec: ModelSpec,
}

impl OpenAiCompatClient {
    /// Create a client against an arbitrary OpenAI-compatible endpoint.
    pub fn new(
        provider_name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: SecretString,
        spec: ModelSpec,
    ) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url: base_url.into(),
            provider_name: provider_name.into(),
            spec,
        }
    }

    /// Create a DeepSeek client.
    ///
    /// Uses `https://api.deepseek.com/v1` as the base URL.
    pub fn deepseek(api_key: SecretString, spec: ModelSpec) -> Self {
        Self::new("deepseek", "https://api.deepseek.com/v1", api_key, spec)
    }

    /// Create a Mistral AI client.
    ///
    /// Uses `https://api.mistral.ai/v1` as the base URL.
    pub fn mistral(api_key: SecretString, spec: ModelSpec) -> Self {
        Self::new("mistral", "https://api.mistral.ai/v1", api_key, spec)
    }
}

// OpenAiCompatClient intentionally does NOT derive Debug so the API key
// never appears in Debug output or tracing logs.

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

impl LlmClient for OpenAiCompatClient {
    fn provider(&self) -> &str {
        &self.provider_name
    }

    async fn query(&self, prompt: &str) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.spec.model,
            max_tokens: self.spec.max_tokens,
            temperature: self.spec.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => LlmError::AuthenticationFailed,
                429 => LlmError::RateLimited,
                _ => LlmError::Provider {
                    message: format!("HTTP {status}: {error_body}"),
                },
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            LlmError::Provider {
                message: "response contained no choices".to_string(),
            }
        })?;

        Ok(choice.message.content)
    }
}

//! AnthropicClient -- concrete [`LlmClient`] implementation for Anthropic Claude.
//!
//! Sends requests to the Anthropic Messages API (`/v1/messages`) with
//! proper authentication headers and collects the text blocks of the
//! response into a single string.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use chainweave_core::llm::LlmClient;
use chainweave_types::llm::{LlmError, ModelSpec};

use super::http_client;

/// Anthropic Claude client for the Messages API.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    spec: ModelSpec,
}

impl AnthropicClient {
    /// The Anthropic API version header value.
    const API_VERSION: &'static str = "2023-06-01";

    /// Create a new Anthropic client for the given model spec.
    pub fn new(api_key: SecretString, spec: ModelSpec) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url: "https://api.anthropic.com".to_string(),
            spec,
        }
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

// AnthropicClient intentionally does NOT derive Debug so the API key
// never appears in Debug output or tracing logs.

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl LlmClient for AnthropicClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    async fn query(&self, prompt: &str) -> Result<String, LlmError> {
        let body = MessagesRequest {
            model: &self.spec.model,
            max_tokens: self.spec.max_tokens,
            temperature: self.spec.temperature,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
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

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        Ok(parsed
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join(""))
    }
}

//! GeminiClient -- concrete [`LlmClient`] implementation for Google Gemini.
//!
//! Sends requests to the native `generateContent` endpoint. Gemini
//! authenticates via a `key` query parameter rather than a header, so the
//! key is exposed only while the URL is being built.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use chainweave_core::llm::LlmClient;
use chainweave_types::llm::{LlmError, ModelSpec};

use super::http_client;

/// Google Gemini client for the generateContent API.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    spec: ModelSpec,
}

impl GeminiClient {
    /// Create a new Gemini client for the given model spec.
    pub fn new(api_key: SecretString, spec: ModelSpec) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            spec,
        }
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

// GeminiClient intentionally does NOT derive Debug so the API key
// never appears in Debug output or tracing logs.

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl LlmClient for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    async fn query(&self, prompt: &str) -> Result<String, LlmError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.spec.temperature,
                max_output_tokens: self.spec.max_tokens,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url,
            self.spec.model,
            self.api_key.expose_secret()
        );

        let response = self
            .client
            .post(&url)
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
                401 | 403 => LlmError::AuthenticationFailed,
                429 => LlmError::RateLimited,
                _ => LlmError::Provider {
                    message: format!("HTTP {status}: {error_body}"),
                },
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        let candidate = parsed.candidates.into_iter().next().ok_or_else(|| {
            LlmError::Provider {
                message: "response contained no candidates".to_string(),
            }
        })?;

        Ok(candidate
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(""))
    }
}

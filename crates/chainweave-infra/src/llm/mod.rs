//! HTTP-backed LLM provider clients.
//!
//! Concrete [`LlmClient`](chainweave_core::llm::LlmClient) implementations
//! over reqwest, plus the [`HttpClientFactory`] that the model-call tool
//! uses to build them at dispatch time.
//!
//! API keys are wrapped in [`secrecy::SecretString`] and are never logged
//! or included in `Debug` output; the client structs omit Debug entirely.

pub mod anthropic;
pub mod factory;
pub mod gemini;
pub mod openai_compat;

pub use anthropic::AnthropicClient;
pub use factory::HttpClientFactory;
pub use gemini::GeminiClient;
pub use openai_compat::OpenAiCompatClient;

use std::time::Duration;

/// Shared reqwest client builder for all providers.
///
/// 5 min timeout for long generations.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
        .expect("failed to create reqwest client")
}

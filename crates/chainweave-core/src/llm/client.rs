//! LlmClient trait definition.
//!
//! The uniform contract for provider backends: one prompt in, one text
//! response out. Uses native async fn in traits (RPITIT, Rust 2024
//! edition). Implementations live in chainweave-infra.

use secrecy::SecretString;

use chainweave_types::llm::{LlmError, ModelSpec};

use super::box_client::BoxLlmClient;

/// Trait for LLM provider backends (Anthropic, Gemini, etc.).
pub trait LlmClient: Send + Sync {
    /// Provider id this client talks to (e.g. "anthropic").
    fn provider(&self) -> &str;

    /// Send a single prompt and receive the full text response.
    fn query(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, LlmError>> + Send;
}

/// Constructs provider clients at dispatch time.
///
/// The model-call tool resolves provider/model/key per step and asks the
/// factory for a client; the HTTP-backed implementation lives in
/// chainweave-infra.
pub trait ClientFactory: Send + Sync {
    /// Build a client for a provider, or fail for providers the factory
    /// does not know.
    fn client(
        &self,
        provider: &str,
        api_key: SecretString,
        spec: &ModelSpec,
    ) -> Result<BoxLlmClient, LlmError>;
}

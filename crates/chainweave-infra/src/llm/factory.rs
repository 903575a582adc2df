//! HttpClientFactory -- builds provider clients at dispatch time.

use secrecy::SecretString;

use chainweave_core::llm::{BoxLlmClient, ClientFactory};
use chainweave_types::llm::{LlmError, ModelSpec};

use super::anthropic::AnthropicClient;
use super::gemini::GeminiClient;
use super::openai_compat::OpenAiCompatClient;

/// Factory for the HTTP-backed provider clients.
///
/// Maps provider ids to concrete clients: `anthropic` and `gemini` get
/// their native protocol clients, `deepseek` and `mistral` share the
/// OpenAI-compatible client.
#[derive(Debug, Clone, Default)]
pub struct HttpClientFactory;

impl HttpClientFactory {
    pub fn new() -> Self {
        Self
    }
}

impl ClientFactory for HttpClientFactory {
    fn client(
        &self,
        provider: &str,
        api_key: SecretString,
        spec: &ModelSpec,
    ) -> Result<BoxLlmClient, LlmError> {
        match provider {
            "anthropic" => Ok(BoxLlmClient::new(AnthropicClient::new(
                api_key,
                spec.clone(),
            ))),
            "gemini" => Ok(BoxLlmClient::new(GeminiClient::new(api_key, spec.clone()))),
            "deepseek" => Ok(BoxLlmClient::new(OpenAiCompatClient::deepseek(
                api_key,
                spec.clone(),
            ))),
            "mistral" => Ok(BoxLlmClient::new(OpenAiCompatClient::mistral(
                api_key,
                spec.clone(),
            ))),
            other => Err(LlmError::UnknownProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_known_providers() {
        let factory = HttpClientFactory::new();
        let spec = ModelSpec::new("some-model");

        for provider in ["anthropic", "gemini", "deepseek", "mistral"] {
            let client = factory
                .client(provider, SecretString::from("test-key"), &spec)
                .unwrap();
            assert_eq!(client.provider(), provider);
        }
    }

    #[test]
    fn test_factory_rejects_unknown_provider() {
        let factory = HttpClientFactory::new();
        let err = factory
            .client("openai", SecretString::from("test-key"), &ModelSpec::new("gpt-4o"))
            .unwrap_err();
        assert!(matches!(err, LlmError::UnknownProvider(p) if p == "openai"));
    }
}

//! BoxLlmClient -- object-safe dynamic dispatch wrapper for LlmClient.
//!
//! Since `LlmClient` uses RPITIT it cannot be a trait object directly.
//! The usual three-part pattern applies:
//! 1. Define an object-safe `LlmClientDyn` trait with boxed futures
//! 2. Blanket-impl `LlmClientDyn` for all `T: LlmClient`
//! 3. `BoxLlmClient` wraps `Box<dyn LlmClientDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use chainweave_types::llm::LlmError;

use super::client::LlmClient;

/// Object-safe version of [`LlmClient`] with boxed futures.
pub trait LlmClientDyn: Send + Sync {
    fn provider(&self) -> &str;

    fn query_boxed<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>>;
}

/// Blanket implementation: any `LlmClient` automatically implements
/// `LlmClientDyn`.
impl<T: LlmClient> LlmClientDyn for T {
    fn provider(&self) -> &str {
        LlmClient::provider(self)
    }

    fn query_boxed<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>> {
        Box::pin(self.query(prompt))
    }
}

/// Type-erased LLM client for runtime provider selection.
pub struct BoxLlmClient {
    inner: Box<dyn LlmClientDyn + Send + Sync>,
}

impl std::fmt::Debug for BoxLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxLlmClient")
            .field("provider", &self.inner.provider())
            .finish()
    }
}

impl BoxLlmClient {
    /// Wrap a concrete `LlmClient` in a type-erased box.
    pub fn new<T: LlmClient + 'static>(client: T) -> Self {
        Self {
            inner: Box::new(client),
        }
    }

    /// Provider id this client talks to.
    pub fn provider(&self) -> &str {
        self.inner.provider()
    }

    /// Send a single prompt and receive the full text response.
    pub async fn query(&self, prompt: &str) -> Result<String, LlmError> {
        self.inner.query_boxed(prompt).await
    }
}

//! KeySource trait definition.
//!
//! Abstracts where provider API keys come from. The engine only ever sees
//! [`secrecy::SecretString`] values; implementations live in
//! chainweave-infra (e.g. `EnvKeySource`).

use secrecy::SecretString;

/// Source of provider API keys.
pub trait KeySource: Send + Sync {
    /// Look up the API key for a provider (e.g. "anthropic").
    /// Returns `None` when no key is configured.
    fn api_key(&self, provider: &str) -> Option<SecretString>;
}

/// Conventional environment variable name for a provider's API key,
/// e.g. `ANTHROPIC_API_KEY` for "anthropic".
pub fn key_env_var(provider: &str) -> String {
    format!("{}_API_KEY", provider.to_uppercase())
}

/// Key source that never yields a key. Useful in tests and for forcing
/// simulated responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKeys;

impl KeySource for NoKeys {
    fn api_key(&self, _provider: &str) -> Option<SecretString> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_env_var_naming() {
        assert_eq!(key_env_var("anthropic"), "ANTHROPIC_API_KEY");
        assert_eq!(key_env_var("deepseek"), "DEEPSEEK_API_KEY");
    }

    #[test]
    fn test_no_keys() {
        assert!(NoKeys.api_key("anthropic").is_none());
    }
}

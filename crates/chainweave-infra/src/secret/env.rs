//! Environment variable key source.
//!
//! Resolves provider API keys from environment variables using the
//! `{PROVIDER}_API_KEY` convention, e.g. `ANTHROPIC_API_KEY`.
//! Read-only: users set keys via shell config, not through our API.

use secrecy::SecretString;

use chainweave_core::secret::{KeySource, key_env_var};

/// Key source backed by process environment variables.
pub struct EnvKeySource;

impl EnvKeySource {
    /// Create a new environment variable key source.
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnvKeySource {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for EnvKeySource {
    fn api_key(&self, provider: &str) -> Option<SecretString> {
        match std::env::var(key_env_var(provider)) {
            Ok(val) if !val.trim().is_empty() => Some(SecretString::from(val)),
            // Empty or non-unicode values are treated as not configured
            // rather than erroring, since keys must be usable strings.
            _ => None,
        }
    }
}

//! Engine configuration.
//!
//! [`EngineConfig`] is built once at startup and never mutated afterwards;
//! tools and the executor only hold shared references to it.

use std::collections::BTreeSet;

/// How the executor treats tool ids with no registered tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Unregistered tool ids are a configuration error.
    #[default]
    Strict,
    /// Unregistered tool ids produce a flagged simulated output.
    Simulate,
}

/// Immutable engine-wide settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    providers: BTreeSet<String>,
    dispatch_mode: DispatchMode,
    max_parallel_queries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            providers: ["anthropic", "gemini", "deepseek", "mistral"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            dispatch_mode: DispatchMode::Strict,
            max_parallel_queries: 4,
        }
    }
}

impl EngineConfig {
    pub fn new(
        providers: impl IntoIterator<Item = String>,
        dispatch_mode: DispatchMode,
        max_parallel_queries: usize,
    ) -> Self {
        Self {
            providers: providers.into_iter().collect(),
            dispatch_mode,
            max_parallel_queries: max_parallel_queries.max(1),
        }
    }

    /// Default provider set with a different dispatch mode.
    pub fn with_dispatch_mode(dispatch_mode: DispatchMode) -> Self {
        Self {
            dispatch_mode,
            ..Self::default()
        }
    }

    pub fn supports_provider(&self, provider: &str) -> bool {
        self.providers.contains(provider)
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(String::as_str)
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.dispatch_mode
    }

    pub fn max_parallel_queries(&self) -> usize {
        self.max_parallel_queries
    }
}

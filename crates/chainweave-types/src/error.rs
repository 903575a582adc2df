use thiserror::Error;

/// Errors from workflow parameter and structure validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("workflow '{0}' not found")]
    UnknownWorkflow(String),

    #[error("missing required parameters for workflow '{workflow}': {missing:?}")]
    MissingParams {
        workflow: String,
        missing: Vec<String>,
    },

    #[error("workflow '{workflow}' has no steps")]
    EmptyWorkflow { workflow: String },

    #[error("duplicate step name '{step}' in workflow '{workflow}'")]
    DuplicateStep { workflow: String, step: String },

    #[error("step '{step}' in workflow '{workflow}' has an empty tool id")]
    EmptyTool { workflow: String, step: String },
}

/// Errors from `{{...}}` template resolution.
///
/// Every variant carries the offending path so failures point at the
/// exact placeholder that could not be resolved.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("parameter '{name}' not found")]
    UnknownParam { name: String },

    #[error("invalid parameter path: '{path}'")]
    InvalidParamPath { path: String },

    #[error("step '{name}' output not found")]
    UnknownStep { name: String },

    #[error("invalid step path: '{path}'")]
    InvalidStepPath { path: String },

    #[error("path '{path}' not found in step output")]
    PathNotFound { path: String },

    #[error("memory context not injected for '{path}'")]
    UnresolvedMemory { path: String },

    #[error("unknown path prefix '{prefix}' in '{path}': use 'params.', 'steps.', or 'memory.'")]
    UnknownPrefix { prefix: String, path: String },
}

/// Errors from tool validation and execution.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("no tool registered for '{0}'")]
    UnknownTool(String),

    #[error("missing required inputs for {tool}: {missing:?}")]
    MissingInputs { tool: String, missing: Vec<String> },

    #[error("unsupported provider '{provider}', supported: {supported:?}")]
    UnsupportedProvider {
        provider: String,
        supported: Vec<String>,
    },

    #[error("invalid input for {tool}: {message}")]
    InvalidInput { tool: String, message: String },

    #[error("tool execution failed: {0}")]
    Execution(String),
}

/// Errors from the memory store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt slice {id}: {message}")]
    CorruptSlice { id: i64, message: String },
}

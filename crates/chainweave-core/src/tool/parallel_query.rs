//! Parallel query tool: fans a batch of model calls out over a bounded
//! pool of workers.
//!
//! Results are reassembled in submission order regardless of completion
//! order, and a failed sub-query never poisons its siblings: the failure
//! is isolated into an error-shaped slot at that query's position.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use chainweave_types::error::ToolError;

use super::Tool;
use super::model_call::ModelCallTool;

/// Tool id for [`ParallelQueryTool`].
pub const PARALLEL_QUERY: &str = "parallel_query";

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Tool for executing multiple model calls concurrently.
///
/// Required input: `queries`, a non-empty list of maps each carrying
/// `provider`, `model`, and `prompt_template`.
/// Optional input: `max_workers` (default 4).
pub struct ParallelQueryTool {
    model_call: Arc<ModelCallTool>,
    default_workers: usize,
}

impl ParallelQueryTool {
    pub fn new(model_call: Arc<ModelCallTool>, default_workers: usize) -> Self {
        Self {
            model_call,
            default_workers: default_workers.max(1),
        }
    }

    fn validate(&self, inputs: &Map<String, Value>) -> Result<Vec<Map<String, Value>>, ToolError> {
        let Some(queries) = inputs.get("queries") else {
            return Err(ToolError::MissingInputs {
                tool: PARALLEL_QUERY.to_string(),
                missing: vec!["queries".to_string()],
            });
        };

        let queries = queries
            .as_array()
            .filter(|items| !items.is_empty())
            .ok_or_else(|| ToolError::InvalidInput {
                tool: PARALLEL_QUERY.to_string(),
                message: "'queries' must be a non-empty list".to_string(),
            })?;

        let mut validated = Vec::with_capacity(queries.len());
        for (i, query) in queries.iter().enumerate() {
            let Some(map) = query.as_object() else {
                return Err(ToolError::InvalidInput {
                    tool: PARALLEL_QUERY.to_string(),
                    message: format!("query {i} must be a map"),
                });
            };
            let missing: Vec<&str> = ["provider", "model", "prompt_template"]
                .iter()
                .copied()
                .filter(|field| !map.contains_key(*field))
                .collect();
            if !missing.is_empty() {
                return Err(ToolError::InvalidInput {
                    tool: PARALLEL_QUERY.to_string(),
                    message: format!("query {i} missing required fields: {missing:?}"),
                });
            }
            validated.push(map.clone());
        }

        Ok(validated)
    }
}

impl Tool for ParallelQueryTool {
    fn name(&self) -> &str {
        PARALLEL_QUERY
    }

    async fn execute(&self, inputs: &Map<String, Value>) -> Result<Value, ToolError> {
        let queries = self.validate(inputs)?;
        let query_count = queries.len();
        let workers = inputs
            .get("max_workers")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(self.default_workers)
            .max(1);

        tracing::info!(query_count, workers, "starting parallel queries");

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut join_set = JoinSet::new();

        for (index, query) in queries.into_iter().enumerate() {
            let tool = Arc::clone(&self.model_call);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return (index, error_slot(&query, "concurrency limiter closed")),
                };
                (index, run_single(&tool, &query).await)
            });
        }

        // Reassemble in submission order, whatever the completion order.
        let mut slots: Vec<Option<Value>> = vec![None; query_count];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, value)) => slots[index] = Some(value),
                Err(e) => tracing::error!(error = %e, "parallel query task aborted"),
            }
        }

        let outputs: Vec<Value> = slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    json!({
                        "output": "[ERROR] Execution failed: task aborted",
                        "error": "task aborted",
                        "simulated": true,
                    })
                })
            })
            .collect();

        let successful_queries = outputs
            .iter()
            .filter(|v| v.get("error").is_none())
            .count();

        tracing::info!(query_count, successful_queries, "parallel queries finished");

        Ok(json!({
            "outputs": outputs,
            "query_count": query_count,
            "successful_queries": successful_queries,
        }))
    }
}

async fn run_single(tool: &ModelCallTool, query: &Map<String, Value>) -> Value {
    let mut call_inputs = Map::new();
    for (from, to) in [
        ("provider", "provider"),
        ("model", "model"),
        ("prompt_template", "prompt"),
        ("max_tokens", "max_tokens"),
        ("temperature", "temperature"),
    ] {
        if let Some(value) = query.get(from) {
            call_inputs.insert(to.to_string(), value.clone());
        }
    }

    match tool.execute(&call_inputs).await {
        Ok(mut result) => {
            if let Some(map) = result.as_object_mut() {
                map.insert(
                    "query_config".to_string(),
                    json!({
                        "provider": query.get("provider").cloned().unwrap_or(Value::Null),
                        "model": query.get("model").cloned().unwrap_or(Value::Null),
                    }),
                );
            }
            result
        }
        Err(e) => {
            tracing::warn!(error = %e, "sub-query failed, isolating into error slot");
            error_slot(query, &e.to_string())
        }
    }
}

fn error_slot(query: &Map<String, Value>, error: &str) -> Value {
    json!({
        "output": format!("[ERROR] Query failed: {error}"),
        "provider": query.get("provider").cloned().unwrap_or(json!("unknown")),
        "model": query.get("model").cloned().unwrap_or(json!("unknown")),
        "error": error,
        "simulated": true,
    })
}

//! Template resolution for `{{...}}` placeholders in step inputs.
//!
//! Resolution is a single pass: every placeholder found in the original
//! text is looked up and substituted exactly once, and substituted text is
//! never re-scanned. Lookups understand two namespaces at this stage:
//! `params.<name>` and `steps.<name>[.<field>...]`. `memory.*` placeholders
//! must already have been replaced by [`crate::memory::MemoryManager`]
//! before generic resolution runs; reaching one here is an error.

use serde_json::{Map, Value};

use chainweave_types::error::ResolutionError;

/// Resolve every `{{...}}` placeholder inside a value tree.
///
/// Strings are template-resolved; maps and arrays recurse with structure
/// and key order preserved; other scalars pass through unchanged.
pub fn resolve_value(
    value: &Value,
    params: &Map<String, Value>,
    step_outputs: &Map<String, Value>,
) -> Result<Value, ResolutionError> {
    match value {
        Value::String(s) => Ok(Value::String(resolve_template(s, params, step_outputs)?)),
        Value::Object(map) => {
            let mut resolved = Map::with_capacity(map.len());
            for (key, item) in map {
                resolved.insert(key.clone(), resolve_value(item, params, step_outputs)?);
            }
            Ok(Value::Object(resolved))
        }
        Value::Array(items) => {
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                resolved.push(resolve_value(item, params, step_outputs)?);
            }
            Ok(Value::Array(resolved))
        }
        other => Ok(other.clone()),
    }
}

/// Resolve all placeholders in a single template string.
///
/// Text with no placeholders comes back unchanged. An unterminated `{{`
/// and an empty `{{}}` are treated as literal text.
pub fn resolve_template(
    template: &str,
    params: &Map<String, Value>,
    step_outputs: &Map<String, Value>,
) -> Result<String, ResolutionError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let expr = after[..end].trim();
                if expr.is_empty() {
                    // `{{}}` is not a placeholder; keep it as literal text.
                    out.push_str(&rest[start..start + end + 4]);
                } else {
                    let value = lookup(expr, params, step_outputs)?;
                    out.push_str(&value_to_string(&value));
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    Ok(out)
}

/// Look up a dot-notation path like `params.query` or
/// `steps.initial_answer.output`.
fn lookup(
    path: &str,
    params: &Map<String, Value>,
    step_outputs: &Map<String, Value>,
) -> Result<Value, ResolutionError> {
    let parts: Vec<&str> = path.split('.').collect();

    match parts[0] {
        "params" => {
            if parts.len() != 2 {
                return Err(ResolutionError::InvalidParamPath {
                    path: path.to_string(),
                });
            }
            params
                .get(parts[1])
                .cloned()
                .ok_or_else(|| ResolutionError::UnknownParam {
                    name: parts[1].to_string(),
                })
        }
        "steps" => {
            if parts.len() < 2 {
                return Err(ResolutionError::InvalidStepPath {
                    path: path.to_string(),
                });
            }
            let step_name = parts[1];
            let mut current =
                step_outputs
                    .get(step_name)
                    .ok_or_else(|| ResolutionError::UnknownStep {
                        name: step_name.to_string(),
                    })?;

            for part in &parts[2..] {
                match current {
                    Value::Object(map) if map.contains_key(*part) => {
                        current = &map[*part];
                    }
                    // A step that returned a bare scalar still satisfies
                    // `steps.<name>.output`.
                    Value::String(_) | Value::Number(_) | Value::Bool(_) if *part == "output" => {
                        return Ok(current.clone());
                    }
                    _ => {
                        return Err(ResolutionError::PathNotFound {
                            path: path.to_string(),
                        });
                    }
                }
            }

            Ok(current.clone())
        }
        "memory" => Err(ResolutionError::UnresolvedMemory {
            path: path.to_string(),
        }),
        prefix => Err(ResolutionError::UnknownPrefix {
            prefix: prefix.to_string(),
            path: path.to_string(),
        }),
    }
}

/// String form of a resolved value for substitution into a template.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

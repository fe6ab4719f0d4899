use serde_json::{Map, Value};
use thiserror::Error;
use wec_context::ContextStore;
use wec_core::StepResult;

use crate::extension::ToolResponse;
use crate::registry::Registry;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown extension '{0}'")]
    ExtensionNotFound(String),
}

/// Interpolate every string-valued leaf of `inputs` against the Context
/// Store, invoke `extension.tool` through the registry, and normalize the
/// raw `ToolResponse` into a [`StepResult`] (§4.5).
///
/// Mirrors `send_payload`/`parse_observation` from the original MCP
/// client: a successful call's content becomes `stdout`, an error call's
/// content becomes `stderr`, and any invocation failure is folded into an
/// `is_error` result rather than propagated, so the interpreter always
/// gets a `StepResult` to record.
pub fn dispatch(
    registry: &Registry,
    ctx: &ContextStore,
    extension_name: &str,
    tool_name: &str,
    inputs: &Map<String, Value>,
) -> Result<StepResult, DispatchError> {
    let extension = registry
        .get(extension_name)
        .ok_or_else(|| DispatchError::ExtensionNotFound(extension_name.to_string()))?;

    let interpolated = interpolate_inputs(ctx, inputs);

    let response = match extension.invoke(tool_name, &interpolated) {
        Ok(response) => response,
        Err(err) => ToolResponse::error(err.to_string()),
    };

    Ok(normalize(response))
}

/// Interpolate every string-valued leaf of a step's input mapping against
/// the Context Store, recursing into nested objects/arrays.
pub fn interpolate_inputs(ctx: &ContextStore, inputs: &Map<String, Value>) -> Map<String, Value> {
    inputs
        .iter()
        .map(|(key, value)| (key.clone(), interpolate_value(ctx, value)))
        .collect()
}

fn interpolate_value(ctx: &ContextStore, value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(wec_eval::interpolate(ctx, s)),
        Value::Object(map) => Value::Object(interpolate_inputs(ctx, map)),
        Value::Array(items) => Value::Array(items.iter().map(|v| interpolate_value(ctx, v)).collect()),
        other => other.clone(),
    }
}

/// Normalize a raw [`ToolResponse`] into a [`StepResult`] (§4.5): error
/// content becomes `stderr`, success content becomes `stdout`.
pub fn normalize(response: ToolResponse) -> StepResult {
    let mut stdout_parts = Vec::new();
    let mut stderr_parts = Vec::new();
    for item in &response.content {
        if response.is_error {
            stderr_parts.push(item.text.clone());
        } else {
            stdout_parts.push(item.text.clone());
        }
    }

    StepResult {
        stdout: stdout_parts.join("\n"),
        stderr: stderr_parts.join("\n"),
        exit_code: if response.is_error { 1 } else { 0 },
        result: response.to_map(),
        is_error: response.is_error,
    }
}

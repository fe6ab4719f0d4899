use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Standardized result from a tool invocation (§4.5), shared between the
/// Tool Dispatcher that produces it and the Context Store that records it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StepResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub result: Map<String, Value>,
    pub is_error: bool,
}

impl StepResult {
    /// Convert to the Context Store entry shape for variable interpolation (§4.2).
    pub fn to_context_entry(&self) -> HashMap<String, Value> {
        HashMap::from([
            ("stdout".to_string(), Value::String(self.stdout.trim().to_string())),
            ("stderr".to_string(), Value::String(self.stderr.trim().to_string())),
            ("exit_code".to_string(), Value::String(self.exit_code.to_string())),
            ("result".to_string(), Value::Object(self.result.clone())),
            ("is_error".to_string(), Value::Bool(self.is_error)),
        ])
    }

    /// The same fields as [`StepResult::to_context_entry`], shaped as a
    /// `serde_json::Map` for use as an Event Log payload.
    pub fn to_context_entry_payload(&self) -> Map<String, Value> {
        self.to_context_entry().into_iter().collect()
    }
}

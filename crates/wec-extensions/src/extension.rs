use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An extension's tool-definition mapping, returned by [`Extension::describe`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A single content item in a tool response (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

/// The raw response shape an extension returns from `invoke`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: Vec<ContentItem>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: true,
        }
    }

    /// Serialize this response to a plain JSON object, used as the
    /// normalized `StepResult::result` field.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// A named external capability provider exposing a `describe`/`invoke`
/// interface (§4.5). Extension implementations other than the built-in
/// [`crate::bash::BashExtension`] are out of scope for this core — they
/// are black-box tool providers obeying this contract.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn describe(&self) -> ToolDefinition;

    fn invoke(&self, tool_name: &str, arguments: &Map<String, Value>) -> anyhow::Result<ToolResponse>;
}

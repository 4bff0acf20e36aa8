//! Core tool-provider trait and result types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use super::catalog::ToolDescriptor;
use crate::agent::AssistantToolCall;
use crate::error::Result;

/// A remote service that exposes a catalog of callable tools
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Fetch the current tool catalog, in provider order
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke one tool.
    ///
    /// Failures reported by the tool itself come back as `Ok` with
    /// `is_error` set; `Err` means the provider could not be reached.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult>;
}

/// Normalized result of one tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Text parts of the response, newline-joined and trimmed
    pub text: String,
    /// Full structured response
    pub raw: Value,
    /// Whether the tool (or the lookup before it) failed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful result
    pub fn new(text: impl Into<String>, raw: Value) -> Self {
        ToolResult {
            text: text.into(),
            raw,
            is_error: false,
        }
    }

    /// Create a failed result the model can read and react to
    pub fn error(tool_name: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        ToolResult {
            raw: json!({ "error": message, "tool": tool_name }),
            text: message,
            is_error: true,
        }
    }

    /// Serialize for the content of a `tool` message
    pub fn to_message_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.text.clone())
    }
}

/// A tool call request from the model, with parsed arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool call ID
    pub id: String,
    /// Tool name
    pub name: String,
    /// Tool arguments, always a JSON object
    pub arguments: Value,
}

impl ToolCall {
    /// Parse the model's request. Arguments that are missing, malformed, or
    /// not a JSON object are replaced by `{}`.
    pub fn from_request(call: &AssistantToolCall) -> Self {
        let raw = call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            json!({})
        } else {
            match serde_json::from_str::<Value>(raw) {
                Ok(value) if value.is_object() => value,
                Ok(other) => {
                    warn!(
                        "Tool arguments for {} are not an object ({}), using {{}}",
                        call.function.name, other
                    );
                    json!({})
                }
                Err(e) => {
                    warn!(
                        "Failed to parse tool arguments for {}: {}",
                        call.function.name, e
                    );
                    json!({})
                }
            }
        };

        ToolCall {
            id: call.id.clone(),
            name: call.function.name.clone(),
            arguments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_serialization() {
        let ok = ToolResult::new("done", json!({"content": []}));
        let content: Value = serde_json::from_str(&ok.to_message_content()).unwrap();
        assert_eq!(content["text"], "done");
        assert!(content.get("is_error").is_none());

        let failed = ToolResult::error("jaccard_topk", "Unknown tool: jaccard_topk");
        let content: Value = serde_json::from_str(&failed.to_message_content()).unwrap();
        assert_eq!(content["is_error"], true);
        assert_eq!(content["raw"]["tool"], "jaccard_topk");
    }

    #[test]
    fn test_parse_valid_arguments() {
        let call = ToolCall::from_request(&AssistantToolCall::function(
            "call_1",
            "get_dataset_id_by_name",
            r#"{"filename": "x.h5ad"}"#,
        ));
        assert_eq!(call.id, "call_1");
        assert_eq!(call.arguments["filename"], "x.h5ad");
    }

    #[test]
    fn test_malformed_arguments_become_empty_object() {
        for raw in ["", "   ", "{not json", "[1, 2]", "\"text\"", "null"] {
            let call = ToolCall::from_request(&AssistantToolCall::function("c", "t", raw));
            assert_eq!(call.arguments, json!({}), "arguments {:?}", raw);
        }
    }
}

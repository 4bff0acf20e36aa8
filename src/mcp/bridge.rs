//! MCP-to-Tool bridge
//!
//! Adapts the MCP client to the `ToolProvider` trait: MCP tool definitions
//! become `ToolDescriptor`s and `tools/call` results become `ToolResult`s.

use async_trait::async_trait;
use serde_json::Value;

use super::client::McpClient;
use super::protocol::{McpTool, McpToolResult};
use crate::error::Result;
use crate::tools::{ToolDescriptor, ToolProvider, ToolResult};

impl From<McpTool> for ToolDescriptor {
    fn from(tool: McpTool) -> Self {
        ToolDescriptor {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            input_schema: tool.input_schema,
        }
    }
}

impl From<McpToolResult> for ToolResult {
    fn from(result: McpToolResult) -> Self {
        // Combine all text content blocks
        let text = result
            .content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        let raw = serde_json::to_value(&result).unwrap_or(Value::Null);

        ToolResult {
            text,
            raw,
            is_error: result.is_error,
        }
    }
}

#[async_trait]
impl ToolProvider for McpClient {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let tools = McpClient::list_tools(self).await?;
        Ok(tools.into_iter().map(ToolDescriptor::from).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult> {
        let result = McpClient::call_tool(self, name, arguments).await?;
        Ok(ToolResult::from(result))
    }
}

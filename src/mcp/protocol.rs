//! MCP wire protocol types
//!
//! Model Context Protocol messages (JSON-RPC 2.0).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol revision that introduced the Streamable HTTP transport
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// JSON-RPC request to an MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl McpRequest {
    /// Create a new MCP request
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        McpRequest {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }

    /// Create an initialize request
    pub fn initialize(id: u64) -> Self {
        Self::new(id, "initialize", Some(serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }
        })))
    }

    /// Create a tools/list request, continuing from `cursor` when paging
    pub fn list_tools(id: u64, cursor: Option<&str>) -> Self {
        let params = cursor.map(|c| serde_json::json!({ "cursor": c }));
        Self::new(id, "tools/list", params)
    }

    /// Create a tools/call request
    pub fn call_tool(id: u64, name: impl Into<String>, arguments: Value) -> Self {
        Self::new(id, "tools/call", Some(serde_json::json!({
            "name": name.into(),
            "arguments": arguments
        })))
    }
}

/// JSON-RPC notification (no response expected)
#[derive(Debug, Clone, Serialize)]
pub struct McpNotification {
    pub jsonrpc: String,
    pub method: String,
}

impl McpNotification {
    /// Sent once the client has processed the initialize result
    pub fn initialized() -> Self {
        McpNotification {
            jsonrpc: "2.0".to_string(),
            method: "notifications/initialized".to_string(),
        }
    }
}

/// JSON-RPC message from an MCP server.
///
/// Server-initiated requests and notifications can share an SSE stream with
/// the reply, so `id` is kept loosely typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    /// Whether this message is the reply to request `id`
    pub fn answers(&self, id: u64) -> bool {
        self.id.as_ref().and_then(Value::as_u64) == Some(id)
            && (self.result.is_some() || self.error.is_some())
    }
}

/// MCP error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Tool definition from an MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    /// Tool name
    pub name: String,
    /// Tool description
    #[serde(default)]
    pub description: Option<String>,
    /// Input schema (JSON Schema)
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Option<Value>,
}

/// Result of a tools/list call
#[derive(Debug, Clone, Deserialize)]
pub struct McpToolList {
    #[serde(default)]
    pub tools: Vec<McpTool>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

/// Content block returned by a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpContent {
    #[serde(rename = "type", default)]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Any other fields (data, mimeType, resource, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl McpContent {
    /// Create a text content block
    pub fn text(text: impl Into<String>) -> Self {
        McpContent {
            content_type: "text".to_string(),
            text: Some(text.into()),
            extra: Map::new(),
        }
    }
}

/// Result of a tools/call response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResult {
    #[serde(default)]
    pub content: Vec<McpContent>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
    /// Any other fields (structuredContent, _meta, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl McpToolResult {
    /// A result describing a JSON-RPC level failure of the call
    pub fn from_rpc_error(error: &McpError) -> Self {
        let mut extra = Map::new();
        if let Ok(value) = serde_json::to_value(error) {
            extra.insert("error".to_string(), value);
        }
        McpToolResult {
            content: vec![McpContent::text(format!(
                "MCP error {}: {}",
                error.code, error.message
            ))],
            is_error: true,
            extra,
        }
    }
}

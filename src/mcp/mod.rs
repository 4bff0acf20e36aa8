//! MCP (Model Context Protocol) module
//!
//! Connects to the remote analysis tool server over the Streamable HTTP
//! transport.
//!
//! ## Architecture
//!
//! - **client**: MCP client, one short-lived session per operation
//! - **protocol**: Wire protocol types (JSON-RPC based)
//! - **bridge**: Adapts the client into the `ToolProvider` trait
//!
//! ## Usage
//!
//! ```rust,no_run
//! use geneprog_agent::config::McpConfig;
//! use geneprog_agent::mcp::McpClient;
//!
//! # async fn example() -> geneprog_agent::Result<()> {
//! let client = McpClient::new(&McpConfig {
//!     url: "http://localhost:8000/mcp".to_string(),
//!     timeout_secs: 120,
//! })?;
//!
//! // List available tools
//! let tools = client.list_tools().await?;
//!
//! // Call a tool
//! let result = client
//!     .call_tool("get_dataset_id_by_name", serde_json::json!({"filename": "x.h5ad"}))
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod bridge;
mod client;
mod protocol;

pub use client::McpClient;
pub use protocol::{McpContent, McpError, McpRequest, McpResponse, McpTool, McpToolResult};

//! Tools module - the remote tool catalog as seen by the model
//!
//! Tools live on a remote provider (an MCP server). This module holds the
//! provider-neutral side: the `ToolProvider` trait, the per-turn
//! `ToolCatalog` and its translation into function-calling definitions, and
//! the `ToolExecutor` that runs the model's tool calls.

mod catalog;
mod executor;
mod traits;

// Core trait and types
pub use traits::{ToolCall, ToolProvider, ToolResult};

// Catalog
pub use catalog::{to_completion_tools, ToolCatalog, ToolDescriptor};

// Execution
pub use executor::ToolExecutor;
pub(crate) use executor::preview;

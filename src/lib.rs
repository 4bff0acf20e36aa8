//! # GeneProg Agent
//!
//! Tool-calling chat agent for single-cell gene program analysis.
//!
//! ## Features
//!
//! - **Agent loop:** bounded model/tool rounds over an OpenAI-compatible chat API
//! - **MCP tools:** analysis tools served by a remote MCP server over Streamable HTTP
//! - **Titles:** short conversation titles with a deterministic fallback
//! - **Shared caches:** injected, concurrency-safe caches for collaborators

pub mod agent;
pub mod cache;
pub mod config;
pub mod error;
pub mod mcp;
pub mod tools;

pub use config::Config;
pub use error::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");

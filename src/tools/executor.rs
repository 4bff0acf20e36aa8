//! Tool execution - dispatches model tool calls to the provider
//!
//! Every outcome, including unknown tools, invalid arguments and an
//! unreachable provider, becomes a `ToolResult` so the conversation can
//! continue and the model can correct itself.

use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::catalog::ToolCatalog;
use super::traits::{ToolProvider, ToolResult};

/// Executes tool calls against one provider, validated by one catalog
pub struct ToolExecutor<'a> {
    provider: &'a dyn ToolProvider,
    catalog: &'a ToolCatalog,
}

impl<'a> ToolExecutor<'a> {
    pub fn new(provider: &'a dyn ToolProvider, catalog: &'a ToolCatalog) -> Self {
        ToolExecutor { provider, catalog }
    }

    /// Invoke `tool_name` with `arguments`. Never fails.
    pub async fn invoke(&self, tool_name: &str, arguments: Value) -> ToolResult {
        let Some(descriptor) = self.catalog.get(tool_name) else {
            warn!("Model requested unknown tool '{}'", tool_name);
            return ToolResult::error(
                tool_name,
                format!(
                    "Unknown tool: {}. Available tools: {}",
                    tool_name,
                    self.catalog.names().join(", ")
                ),
            );
        };

        if let Err(reason) = descriptor.check_arguments(&arguments) {
            warn!("Rejected call to '{}': {}", tool_name, reason);
            return ToolResult::error(tool_name, format!("Invalid arguments: {}", reason));
        }

        let start = Instant::now();
        let result = self.provider.call_tool(tool_name, arguments).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(result) => {
                info!(
                    "Tool {} finished in {}ms (error: {}, {} chars)",
                    tool_name,
                    duration_ms,
                    result.is_error,
                    result.text.len()
                );
                debug!("Tool {} result: {}", tool_name, preview(&result.text, 1000));
                result
            }
            Err(e) => {
                warn!("Tool {} failed after {}ms: {}", tool_name, duration_ms, e);
                ToolResult::error(tool_name, format!("Tool '{}' failed: {}", tool_name, e))
            }
        }
    }
}

/// First `max` characters of `s`, on a char boundary
pub(crate) fn preview(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::tools::ToolDescriptor;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Provider that records calls and answers from a fixed script
    struct RecordingProvider {
        calls: Mutex<Vec<(String, Value)>>,
        reachable: bool,
    }

    impl RecordingProvider {
        fn new(reachable: bool) -> Self {
            RecordingProvider {
                calls: Mutex::new(Vec::new()),
                reachable,
            }
        }
    }

    #[async_trait]
    impl ToolProvider for RecordingProvider {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            Ok(vec![])
        }

        async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult> {
            self.calls.lock().unwrap().push((name.to_string(), arguments.clone()));
            if self.reachable {
                Ok(ToolResult::new("{\"dataset_id\":\"ds_1\"}", json!({"content": []})))
            } else {
                Err(Error::ToolProviderUnavailable("connection refused".into()))
            }
        }
    }

    fn catalog() -> ToolCatalog {
        ToolCatalog::new(vec![ToolDescriptor::new(
            "get_dataset_id_by_name",
            "",
            Some(json!({"type": "object", "required": ["filename"]})),
        )])
    }

    #[tokio::test]
    async fn test_invoke_known_tool() {
        let provider = RecordingProvider::new(true);
        let catalog = catalog();
        let executor = ToolExecutor::new(&provider, &catalog);

        let result = executor
            .invoke("get_dataset_id_by_name", json!({"filename": "x.h5ad"}))
            .await;

        assert!(!result.is_error);
        assert_eq!(result.text, "{\"dataset_id\":\"ds_1\"}");
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_answered_locally() {
        let provider = RecordingProvider::new(true);
        let catalog = catalog();
        let executor = ToolExecutor::new(&provider, &catalog);

        let result = executor.invoke("delete_everything", json!({})).await;

        assert!(result.is_error);
        assert!(result.text.contains("Unknown tool: delete_everything"));
        assert!(result.text.contains("get_dataset_id_by_name"));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_required_argument_is_answered_locally() {
        let provider = RecordingProvider::new(true);
        let catalog = catalog();
        let executor = ToolExecutor::new(&provider, &catalog);

        let result = executor.invoke("get_dataset_id_by_name", json!({})).await;

        assert!(result.is_error);
        assert!(result.text.contains("filename"));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_provider_becomes_error_payload() {
        let provider = RecordingProvider::new(false);
        let catalog = catalog();
        let executor = ToolExecutor::new(&provider, &catalog);

        let result = executor
            .invoke("get_dataset_id_by_name", json!({"filename": "x.h5ad"}))
            .await;

        assert!(result.is_error);
        assert!(result.text.contains("connection refused"));
        assert_eq!(result.raw["tool"], "get_dataset_id_by_name");
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        assert_eq!(preview("héllo", 2), "hé");
        assert_eq!(preview("short", 100), "short");
    }
}

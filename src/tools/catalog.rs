//! Tool catalog - the provider's tools for one conversation turn
//!
//! The catalog is fetched once per orchestration run and translated into the
//! completion service's function-calling schema. Catalog order is kept
//! everywhere so the model always sees tools in the order the provider
//! lists them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::traits::ToolProvider;
use crate::agent::{FunctionDefinition, ToolDefinition};
use crate::error::{Error, Result};

/// A tool as described by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// JSON Schema of the arguments object
    #[serde(default)]
    pub input_schema: Option<Value>,
}

impl ToolDescriptor {
    /// Create a descriptor
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Option<Value>) -> Self {
        ToolDescriptor {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Convert to a completion-service tool definition
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name.clone(),
                description: self.description.clone(),
                parameters: self
                    .input_schema
                    .clone()
                    .filter(|schema| !is_blank_schema(schema))
                    .unwrap_or_else(|| json!({ "type": "object", "properties": {} })),
            },
        }
    }

    /// Check `arguments` against the input schema: it must be an object and
    /// carry every `required` property.
    pub fn check_arguments(&self, arguments: &Value) -> std::result::Result<(), String> {
        let Some(args) = arguments.as_object() else {
            return Err(format!("arguments for '{}' must be a JSON object", self.name));
        };

        let required = self
            .input_schema
            .as_ref()
            .and_then(|schema| schema.get("required"))
            .and_then(Value::as_array);

        let missing: Vec<&str> = required
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter(|key| !args.contains_key(*key))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "missing required argument(s) for '{}': {}",
                self.name,
                missing.join(", ")
            ))
        }
    }
}

/// `null` and `{}` carry no schema
fn is_blank_schema(schema: &Value) -> bool {
    match schema {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Translate descriptors into completion tool definitions, index for index
pub fn to_completion_tools(tools: &[ToolDescriptor]) -> Vec<ToolDefinition> {
    tools.iter().map(ToolDescriptor::to_definition).collect()
}

/// Ordered, name-indexed set of tool descriptors
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    /// Build a catalog. A repeated name keeps its first descriptor.
    pub fn new(descriptors: Vec<ToolDescriptor>) -> Self {
        let mut tools = Vec::with_capacity(descriptors.len());
        let mut index = HashMap::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if index.contains_key(&descriptor.name) {
                warn!("Duplicate tool '{}' in catalog, keeping the first", descriptor.name);
                continue;
            }
            index.insert(descriptor.name.clone(), tools.len());
            tools.push(descriptor);
        }

        ToolCatalog { tools, index }
    }

    /// Fetch the catalog from a provider
    pub async fn fetch(provider: &dyn ToolProvider) -> Result<Self> {
        let descriptors = provider.list_tools().await.map_err(|e| match e {
            Error::ToolProviderUnavailable(_) => e,
            other => Error::ToolProviderUnavailable(format!("failed to list tools: {}", other)),
        })?;

        debug!("Fetched tool catalog with {} tools", descriptors.len());
        Ok(Self::new(descriptors))
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Descriptors in catalog order
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Completion tool definitions in catalog order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        to_completion_tools(&self.tools)
    }

    /// Tool names in catalog order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Get tool count
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolResult;
    use async_trait::async_trait;

    fn sample_tools() -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "get_dataset_id_by_name",
                "Map an uploaded filename to its dataset id",
                Some(json!({
                    "type": "object",
                    "properties": {"filename": {"type": "string"}},
                    "required": ["filename"]
                })),
            ),
            ToolDescriptor::new("program_top_genes", "Top genes of a program", None),
            ToolDescriptor::new("correlation_matrix", "", Some(json!({"type": "object"}))),
        ]
    }

    #[test]
    fn test_completion_tools_preserve_length_and_order() {
        let tools = sample_tools();
        let defs = to_completion_tools(&tools);

        assert_eq!(defs.len(), tools.len());
        for (def, tool) in defs.iter().zip(&tools) {
            assert_eq!(def.tool_type, "function");
            assert_eq!(def.function.name, tool.name);
            assert_eq!(def.function.description, tool.description);
        }
    }

    #[test]
    fn test_completion_tools_are_idempotent() {
        let tools = sample_tools();
        assert_eq!(to_completion_tools(&tools), to_completion_tools(&tools));
    }

    #[test]
    fn test_missing_schema_defaults_to_empty_object_schema() {
        let def = sample_tools()[1].to_definition();
        assert_eq!(def.function.parameters, json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn test_empty_schema_defaults_to_empty_object_schema() {
        let def = ToolDescriptor::new("get_h5ad_schema", "", Some(json!({}))).to_definition();
        assert_eq!(def.function.parameters, json!({"type": "object", "properties": {}}));

        // A non-empty schema is forwarded untouched
        let def = sample_tools()[2].to_definition();
        assert_eq!(def.function.parameters, json!({"type": "object"}));
    }

    #[test]
    fn test_catalog_keeps_first_duplicate() {
        let mut tools = sample_tools();
        tools.push(ToolDescriptor::new("program_top_genes", "shadow", None));
        let catalog = ToolCatalog::new(tools);

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("program_top_genes").unwrap().description, "Top genes of a program");
        assert_eq!(
            catalog.names(),
            vec!["get_dataset_id_by_name", "program_top_genes", "correlation_matrix"]
        );
    }

    #[test]
    fn test_check_arguments() {
        let catalog = ToolCatalog::new(sample_tools());
        let tool = catalog.get("get_dataset_id_by_name").unwrap();

        assert!(tool.check_arguments(&json!({"filename": "x.h5ad"})).is_ok());
        let err = tool.check_arguments(&json!({})).unwrap_err();
        assert!(err.contains("filename"));
        assert!(tool.check_arguments(&json!([1])).is_err());

        // No schema: any object passes
        let tool = catalog.get("program_top_genes").unwrap();
        assert!(tool.check_arguments(&json!({"anything": 1})).is_ok());
    }

    struct DownProvider;

    #[async_trait]
    impl ToolProvider for DownProvider {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
            Err(Error::Protocol("garbled tools/list".into()))
        }

        async fn call_tool(&self, name: &str, _arguments: Value) -> Result<ToolResult> {
            Ok(ToolResult::error(name, "unused"))
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_is_provider_unavailable() {
        let err = ToolCatalog::fetch(&DownProvider).await.unwrap_err();
        assert!(matches!(err, Error::ToolProviderUnavailable(_)));
    }
}

//! Tool trait and registry

use crate::truncation::{self, TruncationConfig};
use async_trait::async_trait;
use scout_ai::ToolDef;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// The result of a successful tool execution
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Short label for UI display
    pub title: String,
    /// Text handed back to the model
    pub output: String,
    /// Structured extras (match counts, truncation flags)
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ToolOutput {
    pub fn new(title: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            output: output.into(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

/// Tool failures are surfaced to the model as message content, never as a
/// fatal loop error.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("tool {0:?} not found. Available tools: grep, glob, read, list")]
    NotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),

    #[error("tool execution cancelled")]
    Cancelled,
}

/// A tool callable by the model
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema for the tool's arguments
    fn parameters(&self) -> serde_json::Value;

    async fn execute(
        &self,
        arguments: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError>;
}

pub type BoxedTool = Arc<dyn Tool>;

/// Holds the available tools and applies output truncation
pub struct ToolRegistry {
    tools: Vec<BoxedTool>,
    /// Compiled argument validators keyed by tool name
    validators: HashMap<String, jsonschema::Validator>,
    output_dir: Option<PathBuf>,
    conversation_id: Option<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            validators: HashMap::new(),
            output_dir: None,
            conversation_id: None,
        }
    }

    /// Directory for stashing full outputs of truncated results
    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) {
        self.output_dir = Some(dir.into());
    }

    /// Conversation id used to group stashed outputs
    pub fn set_conversation_id(&mut self, id: impl Into<String>) {
        self.conversation_id = Some(id.into());
    }

    pub fn register(&mut self, tool: BoxedTool) {
        match jsonschema::validator_for(&tool.parameters()) {
            Ok(validator) => {
                self.validators.insert(tool.name().to_string(), validator);
            }
            Err(error) => {
                tracing::warn!(tool = tool.name(), %error, "failed to compile argument schema");
            }
        }
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&BoxedTool> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    /// Tool definitions in registration order
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools
            .iter()
            .map(|tool| ToolDef {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    /// Execute a tool by name: validate arguments, run, truncate the output.
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        if let Some(validator) = self.validators.get(name) {
            if let Some(message) = validation_errors(validator, &arguments) {
                return Err(ToolError::InvalidArguments(message));
            }
        }

        let mut result = tool.execute(arguments, cancel).await?;

        if let (Some(output_dir), Some(conversation_id)) =
            (&self.output_dir, &self.conversation_id)
        {
            let config = TruncationConfig {
                output_dir: output_dir.clone(),
                conversation_id: conversation_id.clone(),
                tool_name: name.to_string(),
            };
            let truncated = truncation::truncate_output(&result.output, &config);
            if truncated.truncated {
                result.output = truncated.content;
                result
                    .metadata
                    .insert("truncated".to_string(), serde_json::Value::Bool(true));
                if let Some(path) = truncated.output_path {
                    result.metadata.insert(
                        "outputPath".to_string(),
                        serde_json::Value::String(path.display().to_string()),
                    );
                }
            }
        }

        Ok(result)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn validation_errors(
    validator: &jsonschema::Validator,
    arguments: &serde_json::Value,
) -> Option<String> {
    let errors: Vec<String> = validator
        .iter_errors(arguments)
        .map(|e| {
            let path = e.instance_path.to_string();
            if path.is_empty() {
                e.to_string()
            } else {
                format!("{}: {}", path, e)
            }
        })
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(errors.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Repeats its input"
        }

        fn parameters(&self) -> serde_json::Value {
            json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string"},
                    "repeat": {"type": "number"}
                },
                "required": ["text"]
            })
        }

        async fn execute(
            &self,
            arguments: serde_json::Value,
            _cancel: &CancellationToken,
        ) -> Result<ToolOutput, ToolError> {
            let text = arguments["text"].as_str().unwrap_or_default();
            let repeat = arguments["repeat"].as_u64().unwrap_or(1) as usize;
            Ok(ToolOutput::new("echo", text.repeat(repeat)))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry
    }

    #[tokio::test]
    async fn test_unknown_tool_lists_available() {
        let registry = registry();
        let err = registry
            .execute("search", json!({}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "tool \"search\" not found. Available tools: grep, glob, read, list"
        );
    }

    #[tokio::test]
    async fn test_argument_validation() {
        let registry = registry();
        let err = registry
            .execute("echo", json!({"repeat": 2}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().contains("text"));
    }

    #[tokio::test]
    async fn test_execute_and_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = registry();
        registry.set_output_dir(dir.path());
        registry.set_conversation_id("conv-7");

        let long_line = format!("{}\n", "z".repeat(80));
        let result = registry
            .execute(
                "echo",
                json!({"text": long_line, "repeat": 700}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.metadata["truncated"], json!(true));
        let saved = result.metadata["outputPath"].as_str().unwrap();
        assert!(saved.contains("conv-7"));
        assert!(std::path::Path::new(saved).exists());
        assert!(result.output.contains("[Output truncated at 500 lines"));
    }

    #[tokio::test]
    async fn test_no_truncation_without_output_dir() {
        let registry = registry();
        let result = registry
            .execute(
                "echo",
                json!({"text": "line\n", "repeat": 700}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        // Truncation only engages when a stash location is configured
        assert!(!result.metadata.contains_key("truncated"));
    }

    #[test]
    fn test_definitions_preserve_order() {
        let registry = registry();
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }
}

//! Filename search tool

use crate::registry::{Tool, ToolError, ToolOutput};
use crate::tools::{display_path, parse_args, resolve_path};
use async_trait::async_trait;
use scout_search::{GlobOptions, SearchEngine};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DESCRIPTION: &str = r#"Fast file pattern matching tool that works with any codebase size.
Supports glob patterns like "**/*.js" or "src/**/*.ts".
Returns matching file paths sorted by modification time.
Use this tool when you need to find files by name patterns."#;

pub struct GlobTool {
    working_dir: PathBuf,
    engine: Arc<SearchEngine>,
}

impl GlobTool {
    pub fn new(working_dir: impl Into<PathBuf>, engine: Arc<SearchEngine>) -> Self {
        Self {
            working_dir: working_dir.into(),
            engine,
        }
    }
}

#[derive(Deserialize)]
struct GlobArgs {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &'static str {
        "glob"
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "The glob pattern to match files against"
                },
                "path": {
                    "type": "string",
                    "description": "The directory to search in. Defaults to the current working directory."
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let args: GlobArgs = parse_args(arguments)?;
        if args.pattern.is_empty() {
            return Err(ToolError::InvalidArguments("pattern is required".into()));
        }

        let search_path = resolve_path(&self.working_dir, args.path.as_deref());
        let title = search_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| search_path.display().to_string());
        let options = GlobOptions::default();

        let files = self
            .engine
            .glob(&search_path, &args.pattern, &options, cancel)
            .await
            .map_err(|e| match e {
                scout_search::Error::Cancelled => ToolError::Cancelled,
                e => ToolError::Failed(format!("glob failed: {e}")),
            })?;

        if files.is_empty() {
            return Ok(ToolOutput::new(title, "No files found")
                .with_metadata("count", json!(0))
                .with_metadata("truncated", json!(false)));
        }

        let mut output = String::new();
        for file in &files {
            output.push_str(&display_path(&self.working_dir, &file.path));
            output.push('\n');
        }

        let truncated = files.len() >= options.max_files;
        if truncated {
            output.push_str("\n(Results are truncated. Consider using a more specific path or pattern.)");
        }

        Ok(ToolOutput::new(title, output)
            .with_metadata("count", json!(files.len()))
            .with_metadata("truncated", json!(truncated)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(root: &std::path::Path) -> GlobTool {
        GlobTool::new(root, Arc::new(SearchEngine::without_ripgrep()))
    }

    #[tokio::test]
    async fn test_lists_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs").join("guide.md"), "# hi").unwrap();
        std::fs::write(dir.path().join("readme.md"), "# top").unwrap();

        let result = tool(dir.path())
            .execute(json!({"pattern": "**/*.md"}), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.output.contains("docs/guide.md\n"));
        assert!(result.output.contains("readme.md\n"));
        assert_eq!(result.metadata["count"], json!(2));
    }

    #[tokio::test]
    async fn test_no_files_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool(dir.path())
            .execute(json!({"pattern": "*.xyz"}), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.output, "No files found");
    }

    #[tokio::test]
    async fn test_scoped_to_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("a").join("one.txt"), "1").unwrap();
        std::fs::write(dir.path().join("b").join("two.txt"), "2").unwrap();

        let result = tool(dir.path())
            .execute(json!({"pattern": "*.txt", "path": "a"}), &CancellationToken::new())
            .await
            .unwrap();
        assert!(result.output.contains("a/one.txt"));
        assert!(!result.output.contains("two.txt"));
        assert_eq!(result.title, "a");
    }
}

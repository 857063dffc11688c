//! Content search tool

use crate::registry::{Tool, ToolError, ToolOutput};
use crate::tools::{display_path, parse_args, resolve_path};
use async_trait::async_trait;
use scout_search::{GrepOptions, SearchEngine};
use serde::Deserialize;
use serde_json::json;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DESCRIPTION: &str = r#"Fast content search tool that works with any codebase size.
Searches file contents using regular expressions.
Supports full regex syntax (e.g., "log.*Error", "function\s+\w+").
Filter files by pattern with the include parameter (e.g., "*.js", "*.{ts,tsx}").
Returns file paths and line numbers with matches, sorted by modification time.
Use this tool when you need to find files containing specific patterns."#;

pub struct GrepTool {
    working_dir: PathBuf,
    engine: Arc<SearchEngine>,
}

impl GrepTool {
    pub fn new(working_dir: impl Into<PathBuf>, engine: Arc<SearchEngine>) -> Self {
        Self {
            working_dir: working_dir.into(),
            engine,
        }
    }
}

#[derive(Deserialize)]
struct GrepArgs {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    include: Option<String>,
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &'static str {
        "grep"
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
                    "description": "The regex pattern to search for in file contents"
                },
                "path": {
                    "type": "string",
                    "description": "The directory to search in. Defaults to the current working directory."
                },
                "include": {
                    "type": "string",
                    "description": "File pattern to include in the search (e.g., \"*.js\", \"*.{ts,tsx}\")"
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
        let args: GrepArgs = parse_args(arguments)?;
        if args.pattern.is_empty() {
            return Err(ToolError::InvalidArguments("pattern is required".into()));
        }

        let search_path = resolve_path(&self.working_dir, args.path.as_deref());
        let options = GrepOptions {
            include: args.include,
            ..Default::default()
        };

        let matches = self
            .engine
            .grep(&search_path, &args.pattern, &options, cancel)
            .await
            .map_err(|e| match e {
                scout_search::Error::Cancelled => ToolError::Cancelled,
                e => ToolError::Failed(format!("search failed: {e}")),
            })?;

        if matches.is_empty() {
            return Ok(ToolOutput::new(&args.pattern, "No files found")
                .with_metadata("matches", json!(0))
                .with_metadata("truncated", json!(false)));
        }

        let mut output = format!("Found {} matches\n", matches.len());
        let mut current_file: Option<&PathBuf> = None;
        for item in &matches {
            if current_file != Some(&item.path) {
                if current_file.is_some() {
                    output.push('\n');
                }
                current_file = Some(&item.path);
                let _ = writeln!(output, "{}:", display_path(&self.working_dir, &item.path));
            }
            let _ = writeln!(output, "  Line {}: {}", item.line_number, item.line);
        }

        let truncated = matches.len() >= options.max_matches;
        if truncated {
            output.push_str("\n(Results are truncated. Consider using a more specific path or pattern.)");
        }

        Ok(ToolOutput::new(&args.pattern, output)
            .with_metadata("matches", json!(matches.len()))
            .with_metadata("truncated", json!(truncated)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(root: &std::path::Path) -> GrepTool {
        GrepTool::new(root, Arc::new(SearchEngine::without_ripgrep()))
    }

    #[tokio::test]
    async fn test_matches_grouped_by_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(
            dir.path().join("src").join("app.rs"),
            "fn start() {}\nfn stop() {}\nfn start_worker() {}\n",
        )
        .unwrap();

        let result = tool(dir.path())
            .execute(json!({"pattern": "start"}), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.output.starts_with("Found 2 matches\n"));
        assert!(result.output.contains("src/app.rs:\n"));
        assert!(result.output.contains("  Line 1: fn start() {}"));
        assert!(result.output.contains("  Line 3: fn start_worker() {}"));
        assert_eq!(result.metadata["matches"], json!(2));
    }

    #[tokio::test]
    async fn test_no_matches_reports_no_files_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "nothing here\n").unwrap();

        let result = tool(dir.path())
            .execute(json!({"pattern": "absent_symbol"}), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.output, "No files found");
        assert_eq!(result.metadata["matches"], json!(0));
    }

    #[tokio::test]
    async fn test_missing_pattern_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = tool(dir.path())
            .execute(json!({"path": "src"}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_invalid_regex_is_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = tool(dir.path())
            .execute(json!({"pattern": "[bad"}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Failed(_)));
        assert!(err.to_string().contains("search failed"));
    }
}

//! Directory listing tool

use crate::registry::{Tool, ToolError, ToolOutput};
use crate::tools::{display_path, parse_args, resolve_path};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::fmt::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

const DESCRIPTION: &str = r#"Lists files and directories in a given path.
Directories are listed first, then files, both sorted alphabetically.
Hidden files and directories (starting with a dot) are omitted.
The path parameter is optional and defaults to the working directory."#;

pub struct ListTool {
    working_dir: PathBuf,
}

impl ListTool {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default)]
    path: Option<String>,
}

#[async_trait]
impl Tool for ListTool {
    fn name(&self) -> &'static str {
        "list"
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The directory to list (defaults to the working directory)"
                }
            }
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let args: ListArgs = parse_args(arguments)?;
        let path = resolve_path(&self.working_dir, args.path.as_deref());

        let info = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::Failed(format!("directory not found: {}", path.display()))
            } else {
                ToolError::Failed(format!("failed to stat directory: {e}"))
            }
        })?;
        if !info.is_dir() {
            return Err(ToolError::Failed(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let entries = std::fs::read_dir(&path)
            .map_err(|e| ToolError::Failed(format!("failed to read directory: {e}")))?;

        let mut directories: Vec<String> = Vec::new();
        let mut files: Vec<String> = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                directories.push(name);
            } else {
                files.push(name);
            }
        }
        directories.sort();
        files.sort();

        let rel = display_path(&self.working_dir, &path);
        let header = if rel.is_empty() || rel == "." {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        } else {
            rel.clone()
        };

        let mut output = format!("{header}/\n");
        if directories.is_empty() && files.is_empty() {
            output.push_str("  (empty directory)\n");
        } else {
            for dir in &directories {
                let _ = writeln!(output, "  {dir}/");
            }
            for file in &files {
                let _ = writeln!(output, "  {file}");
            }
        }

        let title = if rel.is_empty() { ".".to_string() } else { rel };
        Ok(ToolOutput::new(title, output)
            .with_metadata("directories", json!(directories.len()))
            .with_metadata("files", json!(files.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dirs_before_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("zeta")).unwrap();
        std::fs::create_dir(dir.path().join("alpha")).unwrap();
        std::fs::write(dir.path().join("beta.txt"), "").unwrap();
        std::fs::write(dir.path().join("aaa.txt"), "").unwrap();

        let result = ListTool::new(dir.path())
            .execute(json!({}), &CancellationToken::new())
            .await
            .unwrap();

        let lines: Vec<&str> = result.output.lines().collect();
        assert_eq!(&lines[1..], &["  alpha/", "  zeta/", "  aaa.txt", "  beta.txt"]);
        assert_eq!(result.metadata["directories"], json!(2));
        assert_eq!(result.metadata["files"], json!(2));
    }

    #[tokio::test]
    async fn test_hidden_entries_omitted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".env"), "").unwrap();
        std::fs::write(dir.path().join("visible.rs"), "").unwrap();

        let result = ListTool::new(dir.path())
            .execute(json!({}), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!result.output.contains(".git"));
        assert!(!result.output.contains(".env"));
        assert!(result.output.contains("  visible.rs"));
    }

    #[tokio::test]
    async fn test_empty_directory_marker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("hollow")).unwrap();

        let result = ListTool::new(dir.path())
            .execute(json!({"path": "hollow"}), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.output, "hollow/\n  (empty directory)\n");
        assert_eq!(result.title, "hollow");
    }

    #[tokio::test]
    async fn test_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plain.txt"), "x").unwrap();

        let err = ListTool::new(dir.path())
            .execute(json!({"path": "plain.txt"}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("path is not a directory"));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = ListTool::new(dir.path())
            .execute(json!({"path": "nope"}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("directory not found"));
    }
}

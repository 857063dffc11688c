//! File reading tool

use crate::registry::{Tool, ToolError, ToolOutput};
use crate::tools::{display_path, parse_args, similar};
use async_trait::async_trait;
use scout_search::binary;
use serde::Deserialize;
use serde_json::json;
use std::fmt::Write;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

const DESCRIPTION: &str = r#"Reads a file from the local filesystem.
You can access any file directly by using this tool.
By default, it reads up to 2000 lines starting from the beginning of the file.
You can optionally specify a line offset and limit for long files.
Any lines longer than 2000 characters will be truncated.
Results are returned with line numbers starting at 1."#;

const DEFAULT_READ_LIMIT: usize = 2000;
const MAX_LINE_LENGTH: usize = 2000;
const MAX_BYTES: usize = 50 * 1024;
const MAX_SUGGESTIONS: usize = 3;

pub struct ReadTool {
    working_dir: PathBuf,
}

impl ReadTool {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadArgs {
    file_path: String,
    #[serde(default)]
    offset: usize,
    #[serde(default)]
    limit: usize,
}

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &'static str {
        "read"
    }

    fn description(&self) -> &'static str {
        DESCRIPTION
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "filePath": {
                    "type": "string",
                    "description": "The path to the file to read"
                },
                "offset": {
                    "type": "number",
                    "description": "The line number to start reading from (0-based)"
                },
                "limit": {
                    "type": "number",
                    "description": "The number of lines to read (defaults to 2000)"
                }
            },
            "required": ["filePath"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        _cancel: &CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let args: ReadArgs = parse_args(arguments)?;
        if args.file_path.is_empty() {
            return Err(ToolError::InvalidArguments("filePath is required".into()));
        }

        let path = if Path::new(&args.file_path).is_absolute() {
            PathBuf::from(&args.file_path)
        } else {
            self.working_dir.join(&args.file_path)
        };

        let info = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                not_found_error(&path)
            } else {
                ToolError::Failed(format!("failed to stat file: {e}"))
            }
        })?;
        if info.is_dir() {
            return Err(ToolError::Failed(format!(
                "path is a directory, not a file: {}",
                path.display()
            )));
        }

        if binary::has_binary_extension(&path) || binary::is_binary_content(&path).unwrap_or(true)
        {
            return Err(ToolError::Failed(format!(
                "cannot read binary file: {}",
                path.display()
            )));
        }

        let limit = if args.limit == 0 {
            DEFAULT_READ_LIMIT
        } else {
            args.limit
        };
        let offset = args.offset;

        let file = std::fs::File::open(&path)
            .map_err(|e| ToolError::Failed(format!("failed to open file: {e}")))?;
        let reader = std::io::BufReader::new(file);

        let mut lines: Vec<String> = Vec::new();
        let mut line_num = 0usize;
        let mut bytes_read = 0usize;
        let mut truncated_by_bytes = false;

        for line in reader.lines() {
            let mut line =
                line.map_err(|e| ToolError::Failed(format!("failed to read file: {e}")))?;
            line_num += 1;
            if line_num <= offset {
                continue;
            }
            if lines.len() >= limit {
                break;
            }
            if let Some((index, _)) = line.char_indices().nth(MAX_LINE_LENGTH) {
                line.truncate(index);
                line.push_str("...");
            }
            let line_bytes = line.len() + 1;
            if bytes_read + line_bytes > MAX_BYTES {
                truncated_by_bytes = true;
                break;
            }
            bytes_read += line_bytes;
            lines.push(line);
        }

        let mut output = String::from("<file>\n");
        for (i, line) in lines.iter().enumerate() {
            let _ = writeln!(output, "{:05}| {}", offset + i + 1, line);
        }

        let last_read_line = offset + lines.len();
        let has_more_lines = line_num > last_read_line;

        if truncated_by_bytes {
            let _ = write!(
                output,
                "\n(Output truncated at {} bytes. Use 'offset' parameter to read beyond line {})",
                MAX_BYTES, last_read_line
            );
        } else if has_more_lines {
            let _ = write!(
                output,
                "\n(File has more lines. Use 'offset' parameter to read beyond line {})",
                last_read_line
            );
        } else {
            let _ = write!(output, "\n(End of file - total {} lines)", line_num);
        }
        output.push_str("\n</file>");

        let title = display_path(&self.working_dir, &path);
        Ok(ToolOutput::new(title, output)
            .with_metadata("truncated", json!(truncated_by_bytes || has_more_lines)))
    }
}

fn not_found_error(path: &Path) -> ToolError {
    let suggestions = similar::suggest_similar_files(path, MAX_SUGGESTIONS);
    if suggestions.is_empty() {
        return ToolError::Failed(format!("file not found: {}", path.display()));
    }
    let list = suggestions
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n  ");
    ToolError::Failed(format!(
        "file not found: {}\n\nDid you mean one of these?\n  {}",
        path.display(),
        list
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(root: &Path) -> ReadTool {
        ReadTool::new(root)
    }

    #[tokio::test]
    async fn test_numbered_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("small.txt"), "alpha\nbeta\ngamma\n").unwrap();

        let result = tool(dir.path())
            .execute(json!({"filePath": "small.txt"}), &CancellationToken::new())
            .await
            .unwrap();

        assert!(result.output.starts_with("<file>\n"));
        assert!(result.output.contains("00001| alpha\n"));
        assert!(result.output.contains("00003| gamma\n"));
        assert!(result.output.contains("(End of file - total 3 lines)"));
        assert!(result.output.ends_with("</file>"));
        assert_eq!(result.metadata["truncated"], json!(false));
    }

    #[tokio::test]
    async fn test_offset_and_limit_window() {
        let dir = tempfile::tempdir().unwrap();
        let content: String = (1..=10).map(|i| format!("line{i}\n")).collect();
        std::fs::write(dir.path().join("ten.txt"), content).unwrap();

        let result = tool(dir.path())
            .execute(
                json!({"filePath": "ten.txt", "offset": 3, "limit": 2}),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(result.output.contains("00004| line4\n"));
        assert!(result.output.contains("00005| line5\n"));
        assert!(!result.output.contains("line6"));
        assert!(result
            .output
            .contains("(File has more lines. Use 'offset' parameter to read beyond line 5)"));
        assert_eq!(result.metadata["truncated"], json!(true));
    }

    #[tokio::test]
    async fn test_long_lines_truncated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("wide.txt"),
            format!("{}\n", "w".repeat(2500)),
        )
        .unwrap();

        let result = tool(dir.path())
            .execute(json!({"filePath": "wide.txt"}), &CancellationToken::new())
            .await
            .unwrap();
        let line = result.output.lines().nth(1).unwrap();
        assert!(line.ends_with("..."));
        assert_eq!(line.len(), 7 + MAX_LINE_LENGTH + 3); // "00001| " + content + "..."
    }

    #[tokio::test]
    async fn test_missing_file_suggests_similar() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "x = 1\n").unwrap();

        let err = tool(dir.path())
            .execute(json!({"filePath": "config.tml"}), &CancellationToken::new())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("file not found"));
        assert!(message.contains("Did you mean one of these?"));
        assert!(message.contains("config.toml"));
    }

    #[tokio::test]
    async fn test_binary_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blob"), [0u8, 159, 146, 150]).unwrap();

        let err = tool(dir.path())
            .execute(json!({"filePath": "blob"}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot read binary file"));
    }

    #[tokio::test]
    async fn test_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let err = tool(dir.path())
            .execute(json!({"filePath": "sub"}), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("path is a directory"));
    }
}

//! Tool output truncation
//!
//! Large tool outputs are cut down before they reach the model: first to a
//! line budget, then to a byte budget. The full output is written to a side
//! file per conversation so the model (or a human) can be pointed at it; any
//! filesystem failure degrades silently to truncation without the file.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const MAX_OUTPUT_BYTES: usize = 50 * 1024;
pub const MAX_OUTPUT_LINES: usize = 500;
pub const OUTPUT_FILE_EXPIRY: Duration = Duration::from_secs(24 * 60 * 60);

/// Where full outputs for a conversation live
#[derive(Debug, Clone)]
pub struct TruncationConfig {
    pub output_dir: PathBuf,
    pub conversation_id: String,
    pub tool_name: String,
}

/// The outcome of a truncation pass
#[derive(Debug, Clone)]
pub struct TruncationResult {
    pub content: String,
    pub truncated: bool,
    /// Path to the saved full output, when the side file was written
    pub output_path: Option<PathBuf>,
}

/// Truncate `output` if it exceeds the line or byte budget, stashing the
/// full text under `<output_dir>/<conversation_id>/<tool>-<id>.txt`.
pub fn truncate_output(output: &str, config: &TruncationConfig) -> TruncationResult {
    let line_count = output.lines().count();
    if output.len() <= MAX_OUTPUT_BYTES && line_count <= MAX_OUTPUT_LINES {
        return TruncationResult {
            content: output.to_string(),
            truncated: false,
            output_path: None,
        };
    }

    let conversation_dir = config.output_dir.join(&config.conversation_id);
    if std::fs::create_dir_all(&conversation_dir).is_err() {
        return truncate_in_memory(output, line_count);
    }

    let filename = format!("{}-{}.txt", config.tool_name, short_id());
    let output_path = conversation_dir.join(filename);
    if std::fs::write(&output_path, output).is_err() {
        return truncate_in_memory(output, line_count);
    }

    let mut result = truncate_in_memory(output, line_count);
    result
        .content
        .push_str(&format!("\n\n[Full output saved to: {}]", output_path.display()));
    result.output_path = Some(output_path);
    result
}

fn truncate_in_memory(output: &str, line_count: usize) -> TruncationResult {
    let mut content = if line_count > MAX_OUTPUT_LINES {
        let kept: Vec<&str> = output.lines().take(MAX_OUTPUT_LINES).collect();
        format!(
            "{}\n\n[Output truncated at {} lines. Total: {} lines]",
            kept.join("\n"),
            MAX_OUTPUT_LINES,
            line_count
        )
    } else {
        output.to_string()
    };

    if content.len() > MAX_OUTPUT_BYTES {
        let cut = floor_char_boundary(&content, MAX_OUTPUT_BYTES);
        content.truncate(cut);
        content.push_str("\n\n[Output truncated at 50KB]");
    }

    TruncationResult {
        content,
        truncated: true,
        output_path: None,
    }
}

/// Delete stashed outputs older than [`OUTPUT_FILE_EXPIRY`] and remove
/// conversation directories left empty. Errors are skipped, not surfaced.
pub fn cleanup_old_outputs(output_dir: &Path) {
    let Ok(entries) = std::fs::read_dir(output_dir) else {
        return;
    };
    let cutoff = SystemTime::now() - OUTPUT_FILE_EXPIRY;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Ok(files) = std::fs::read_dir(&path) else {
            continue;
        };
        for file in files.flatten() {
            let expired = file
                .metadata()
                .and_then(|m| m.modified())
                .map(|modified| modified < cutoff)
                .unwrap_or(false);
            if expired {
                let _ = std::fs::remove_file(file.path());
            }
        }
        let empty = std::fs::read_dir(&path)
            .map(|mut d| d.next().is_none())
            .unwrap_or(false);
        if empty {
            let _ = std::fs::remove_dir(&path);
        }
    }
}

fn short_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut index = index;
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

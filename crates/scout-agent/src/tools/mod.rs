//! The four read-only tools exposed to the model

mod glob;
mod grep;
mod list;
mod read;
mod similar;

pub use glob::GlobTool;
pub use grep::GrepTool;
pub use list::ListTool;
pub use read::ReadTool;

use crate::registry::{ToolError, ToolRegistry};
use scout_search::SearchEngine;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Registry with grep, glob, read, and list, all rooted at `working_dir`
pub fn default_registry(working_dir: impl Into<PathBuf>, engine: Arc<SearchEngine>) -> ToolRegistry {
    let working_dir = working_dir.into();
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(GrepTool::new(&working_dir, engine.clone())));
    registry.register(Arc::new(GlobTool::new(&working_dir, engine)));
    registry.register(Arc::new(ReadTool::new(&working_dir)));
    registry.register(Arc::new(ListTool::new(&working_dir)));
    registry
}

/// Resolve a tool path argument: absolute paths pass through, relative ones
/// are joined to the working directory.
fn resolve_path(working_dir: &Path, arg: Option<&str>) -> PathBuf {
    match arg {
        Some(path) if !path.is_empty() => {
            let path = Path::new(path);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                working_dir.join(path)
            }
        }
        _ => working_dir.to_path_buf(),
    }
}

/// Display a path relative to the working directory when possible
fn display_path(working_dir: &Path, path: &Path) -> String {
    path.strip_prefix(working_dir)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn parse_args<T: serde::de::DeserializeOwned>(
    arguments: serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

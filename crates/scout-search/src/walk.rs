//! Internal directory walker used when ripgrep is unavailable
//!
//! Built on the `ignore` crate: hidden entries are skipped and `.gitignore`
//! rules are evaluated per directory, pruning ignored subtrees without
//! descending into them.

use crate::{binary, Error, FileInfo, Match, Result};
use globset::GlobMatcher;
use ignore::WalkBuilder;
use regex::Regex;
use std::path::Path;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;

fn walker(root: &Path) -> ignore::Walk {
    WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .follow_links(false)
        .build()
}

/// Whether a file passes the include filter: the glob is tried against the
/// bare filename and against the root-relative path.
fn matches_glob(matcher: &GlobMatcher, root: &Path, path: &Path) -> bool {
    if let Some(name) = path.file_name() {
        if matcher.is_match(name) {
            return true;
        }
    }
    match path.strip_prefix(root) {
        Ok(rel) => matcher.is_match(rel),
        Err(_) => matcher.is_match(path),
    }
}

pub(crate) fn grep(
    root: &Path,
    regex: &Regex,
    include: Option<&GlobMatcher>,
    collect_limit: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Match>> {
    let mut matches = Vec::new();

    for entry in walker(root) {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::debug!(%error, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        if let Some(matcher) = include {
            if !matches_glob(matcher, root, path) {
                continue;
            }
        }
        if binary::is_binary_file(path) {
            continue;
        }
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        let content = String::from_utf8_lossy(&bytes);
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        for (index, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                matches.push(Match {
                    path: path.to_path_buf(),
                    line_number: index as u64 + 1,
                    line: line.to_string(),
                    modified,
                });
                if matches.len() >= collect_limit {
                    return Ok(matches);
                }
            }
        }
    }

    Ok(matches)
}

pub(crate) fn glob(
    root: &Path,
    matcher: &GlobMatcher,
    collect_limit: usize,
    cancel: &CancellationToken,
) -> Result<Vec<FileInfo>> {
    let mut files = Vec::new();

    for entry in walker(root) {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::debug!(%error, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        if !matches_glob(matcher, root, path) {
            continue;
        }
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        files.push(FileInfo {
            path: path.to_path_buf(),
            modified,
        });
        if files.len() >= collect_limit {
            break;
        }
    }

    Ok(files)
}

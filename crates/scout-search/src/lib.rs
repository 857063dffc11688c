//! scout-search: gitignore-aware code search
//!
//! Content search (grep) and filename search (glob) over a directory tree,
//! skipping hidden entries, gitignored paths, and binary files. When a
//! ripgrep binary is on PATH the scan is delegated to it; otherwise an
//! internal walker produces the same results. Both paths rank results by
//! file modification time, newest first.

pub mod binary;
mod ripgrep;
mod walk;

use globset::GlobBuilder;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result type alias using scout-search Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid glob: {0}")]
    Glob(#[from] globset::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("search cancelled")]
    Cancelled,

    #[error("ripgrep error: {0}")]
    Ripgrep(String),
}

/// A single grep hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub path: PathBuf,
    pub line_number: u64,
    pub line: String,
    pub modified: SystemTime,
}

/// A file found by glob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Options for content search
#[derive(Debug, Clone)]
pub struct GrepOptions {
    /// Glob filter tried against the bare filename and the root-relative path
    pub include: Option<String>,
    /// Cap on returned matches (the newest survive)
    pub max_matches: usize,
    /// Longer matched lines are cut here with a `...` marker
    pub max_line_length: usize,
}

impl Default for GrepOptions {
    fn default() -> Self {
        Self {
            include: None,
            max_matches: 100,
            max_line_length: 2000,
        }
    }
}

/// Options for filename search
#[derive(Debug, Clone)]
pub struct GlobOptions {
    /// Cap on returned files (the newest survive)
    pub max_files: usize,
}

impl Default for GlobOptions {
    fn default() -> Self {
        Self { max_files: 100 }
    }
}

/// Whether a [`SearchEngine`] may delegate to an installed ripgrep binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RipgrepCapability {
    /// Probe PATH once, lazily, on first use
    Auto,
    /// Always use the internal walker
    Disabled,
}

/// How many results beyond the cap are collected before ranking, so the cap
/// keeps the globally newest matches rather than the first encountered.
const OVERSCAN: usize = 20;

/// Search over a directory tree
pub struct SearchEngine {
    capability: RipgrepCapability,
    available: OnceLock<bool>,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::with_capability(RipgrepCapability::Auto)
    }

    pub fn with_capability(capability: RipgrepCapability) -> Self {
        Self {
            capability,
            available: OnceLock::new(),
        }
    }

    /// Engine that never shells out, useful for deterministic tests
    pub fn without_ripgrep() -> Self {
        Self::with_capability(RipgrepCapability::Disabled)
    }

    fn ripgrep_available(&self) -> bool {
        match self.capability {
            RipgrepCapability::Disabled => false,
            RipgrepCapability::Auto => *self.available.get_or_init(ripgrep::detect),
        }
    }

    /// Search file contents for a regex pattern.
    ///
    /// Returns up to `max_matches` hits sorted by file modification time,
    /// newest first. The pattern is validated even on the ripgrep path so
    /// both paths reject the same inputs.
    pub async fn grep(
        &self,
        root: &Path,
        pattern: &str,
        options: &GrepOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Match>> {
        let regex = Regex::new(pattern)?;
        let include = options
            .include
            .as_deref()
            .map(|p| GlobBuilder::new(p).build().map(|g| g.compile_matcher()))
            .transpose()?;
        let collect_limit = options.max_matches.saturating_mul(OVERSCAN);

        let mut matches = if self.ripgrep_available() {
            match ripgrep::grep(root, pattern, options.include.as_deref(), collect_limit, cancel)
                .await
            {
                Ok(matches) => matches,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(error) => {
                    tracing::warn!(%error, "ripgrep failed, using internal walker");
                    walk_grep(root, regex, include, collect_limit, cancel).await?
                }
            }
        } else {
            walk_grep(root, regex, include, collect_limit, cancel).await?
        };

        matches.sort_by(|a, b| b.modified.cmp(&a.modified));
        matches.truncate(options.max_matches);
        for item in &mut matches {
            truncate_line(&mut item.line, options.max_line_length);
        }
        Ok(matches)
    }

    /// Find files whose name or root-relative path matches a glob pattern.
    ///
    /// Returns up to `max_files` entries sorted by modification time, newest
    /// first.
    pub async fn glob(
        &self,
        root: &Path,
        pattern: &str,
        options: &GlobOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<FileInfo>> {
        let matcher = GlobBuilder::new(pattern).build()?.compile_matcher();
        let collect_limit = options.max_files.saturating_mul(OVERSCAN);

        let mut files = if self.ripgrep_available() {
            match ripgrep::glob(root, pattern, collect_limit, cancel).await {
                Ok(files) => files,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(error) => {
                    tracing::warn!(%error, "ripgrep failed, using internal walker");
                    walk_glob(root, matcher, collect_limit, cancel).await?
                }
            }
        } else {
            walk_glob(root, matcher, collect_limit, cancel).await?
        };

        files.sort_by(|a, b| b.modified.cmp(&a.modified));
        files.truncate(options.max_files);
        Ok(files)
    }
}

async fn walk_grep(
    root: &Path,
    regex: Regex,
    include: Option<globset::GlobMatcher>,
    collect_limit: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Match>> {
    let root = root.to_path_buf();
    let cancel = cancel.clone();
    tokio::task::spawn_blocking(move || {
        walk::grep(&root, &regex, include.as_ref(), collect_limit, &cancel)
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

async fn walk_glob(
    root: &Path,
    matcher: globset::GlobMatcher,
    collect_limit: usize,
    cancel: &CancellationToken,
) -> Result<Vec<FileInfo>> {
    let root = root.to_path_buf();
    let cancel = cancel.clone();
    tokio::task::spawn_blocking(move || walk::glob(&root, &matcher, collect_limit, &cancel))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

/// Cut a line to `max` characters, appending `...` when anything was dropped.
/// Operates on character boundaries so multi-byte text never splits.
fn truncate_line(line: &mut String, max: usize) {
    if let Some((index, _)) = line.char_indices().nth(max) {
        line.truncate(index);
        line.push_str("...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};

    fn set_mtime(path: &Path, age: Duration) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.rs"), "fn handler() {}\n").unwrap();
        fs::write(root.join("b.rs"), "fn handler() {}\nfn other() {}\n").unwrap();
        fs::write(root.join("c.rs"), "fn handler() {}\n").unwrap();
        set_mtime(&root.join("a.rs"), Duration::from_secs(3600));
        set_mtime(&root.join("b.rs"), Duration::from_secs(1800));
        set_mtime(&root.join("c.rs"), Duration::from_secs(60));
        dir
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_grep_cap_keeps_newest() {
        let dir = fixture();
        let engine = SearchEngine::without_ripgrep();
        let options = GrepOptions {
            max_matches: 2,
            ..Default::default()
        };
        let matches = engine
            .grep(dir.path(), "handler", &options, &CancellationToken::new())
            .await
            .unwrap();
        let paths: Vec<PathBuf> = matches.iter().map(|m| m.path.clone()).collect();
        assert_eq!(names(&paths), vec!["c.rs", "b.rs"]);
    }

    #[tokio::test]
    async fn test_grep_respects_gitignore_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join(".gitignore"), "vendor/\n").unwrap();
        fs::write(root.join("main.rs"), "fn target() {}\n").unwrap();
        fs::create_dir(root.join("vendor")).unwrap();
        fs::write(root.join("vendor").join("dep.rs"), "fn target() {}\n").unwrap();
        fs::create_dir(root.join(".cache")).unwrap();
        fs::write(root.join(".cache").join("x.rs"), "fn target() {}\n").unwrap();

        let engine = SearchEngine::without_ripgrep();
        let matches = engine
            .grep(
                root,
                "target",
                &GrepOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let paths: Vec<PathBuf> = matches.iter().map(|m| m.path.clone()).collect();
        assert_eq!(names(&paths), vec!["main.rs"]);
    }

    #[tokio::test]
    async fn test_grep_include_filter() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("app.rs"), "shared_name\n").unwrap();
        fs::write(root.join("app.md"), "shared_name\n").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("deep.rs"), "shared_name\n").unwrap();

        let engine = SearchEngine::without_ripgrep();
        let options = GrepOptions {
            include: Some("*.rs".into()),
            ..Default::default()
        };
        let matches = engine
            .grep(root, "shared_name", &options, &CancellationToken::new())
            .await
            .unwrap();
        let mut found = names(&matches.iter().map(|m| m.path.clone()).collect::<Vec<_>>());
        found.sort();
        assert_eq!(found, vec!["app.rs", "deep.rs"]);
    }

    #[tokio::test]
    async fn test_grep_skips_binary_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("good.txt"), "needle here\n").unwrap();
        fs::write(root.join("blob.dat"), b"needle\x00\x01\x02".as_slice()).unwrap();

        let engine = SearchEngine::without_ripgrep();
        let matches = engine
            .grep(
                root,
                "needle",
                &GrepOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].path.ends_with("good.txt"));
    }

    #[tokio::test]
    async fn test_grep_truncates_long_lines() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("long.txt"), format!("start {}\n", "x".repeat(100))).unwrap();

        let engine = SearchEngine::without_ripgrep();
        let options = GrepOptions {
            max_line_length: 10,
            ..Default::default()
        };
        let matches = engine
            .grep(root, "start", &options, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(matches[0].line, "start xxxx...");
    }

    #[tokio::test]
    async fn test_grep_invalid_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SearchEngine::without_ripgrep();
        let err = engine
            .grep(
                dir.path(),
                "[unclosed",
                &GrepOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Pattern(_)));
    }

    #[tokio::test]
    async fn test_grep_cancelled() {
        let dir = fixture();
        let engine = SearchEngine::without_ripgrep();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = engine
            .grep(dir.path(), "handler", &GrepOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_glob_newest_first() {
        let dir = fixture();
        let engine = SearchEngine::without_ripgrep();
        let files = engine
            .glob(
                dir.path(),
                "*.rs",
                &GlobOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        let paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(names(&paths), vec!["c.rs", "b.rs", "a.rs"]);
    }

    #[tokio::test]
    async fn test_glob_recursive_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src").join("inner")).unwrap();
        fs::write(root.join("src").join("inner").join("deep.toml"), "x").unwrap();
        fs::write(root.join("top.toml"), "y").unwrap();

        let engine = SearchEngine::without_ripgrep();
        let files = engine
            .glob(
                root,
                "**/*.toml",
                &GlobOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_ripgrep_and_walker_agree_on_non_git_gitignore() {
        // The fixture is not a git repository, so this pins the behavior that
        // both paths still honor .gitignore there (rg needs --no-require-git
        // for that). Degrades to walker-vs-walker on hosts without rg.
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join(".gitignore"), "vendor/\n").unwrap();
        fs::write(root.join("main.rs"), "fn handler() {}\n").unwrap();
        fs::create_dir(root.join("vendor")).unwrap();
        fs::write(root.join("vendor").join("dep.rs"), "fn handler() {}\n").unwrap();

        let with_rg = SearchEngine::new();
        let without = SearchEngine::without_ripgrep();

        let options = GrepOptions::default();
        let cancel = CancellationToken::new();
        let a = with_rg
            .grep(root, "handler", &options, &cancel)
            .await
            .unwrap();
        let b = without
            .grep(root, "handler", &options, &cancel)
            .await
            .unwrap();

        let key = |m: &Match| (m.path.clone(), m.line_number);
        let mut ka: Vec<_> = a.iter().map(key).collect();
        let mut kb: Vec<_> = b.iter().map(key).collect();
        ka.sort();
        kb.sort();
        assert_eq!(ka, kb);
        assert_eq!(names(&ka.iter().map(|(p, _)| p.clone()).collect::<Vec<_>>()), vec!["main.rs"]);
    }
}

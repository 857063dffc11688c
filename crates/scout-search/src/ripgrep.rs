//! Delegation to an installed ripgrep binary
//!
//! ripgrep's defaults line up with the internal walker: hidden entries and
//! gitignored paths are skipped, so both paths return the same result set.
//! `--no-require-git` keeps `.gitignore` rules in effect outside git repos,
//! matching the walker. Residual divergence: the walker also skips files on
//! the binary extension denylist, so a text file with a binary extension can
//! appear on the ripgrep path but not the walker path.
//! Output is parsed from `--field-match-separator=|` framed lines.

use crate::{Error, FileInfo, Match, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Probe PATH for a working ripgrep binary
pub(crate) fn detect() -> bool {
    std::process::Command::new("rg")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

pub(crate) async fn grep(
    root: &Path,
    pattern: &str,
    include: Option<&str>,
    collect_limit: usize,
    cancel: &CancellationToken,
) -> Result<Vec<Match>> {
    let mut command = Command::new("rg");
    command.args([
        "-n",
        "-H",
        "--no-heading",
        "--color=never",
        "--no-require-git",
        "--field-match-separator=|",
        "--regexp",
        pattern,
    ]);
    if let Some(include) = include {
        command.arg("--glob").arg(include);
    }
    command.arg(".");

    let lines = run(command, root, collect_limit, cancel).await?;
    let mut matches = Vec::new();
    for line in lines {
        let mut parts = line.splitn(3, '|');
        let (Some(path), Some(number), Some(text)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let Ok(line_number) = number.parse::<u64>() else {
            continue;
        };
        let path = resolve(root, path);
        matches.push(Match {
            modified: modified(&path),
            path,
            line_number,
            line: text.to_string(),
        });
    }
    Ok(matches)
}

pub(crate) async fn glob(
    root: &Path,
    pattern: &str,
    collect_limit: usize,
    cancel: &CancellationToken,
) -> Result<Vec<FileInfo>> {
    let mut command = Command::new("rg");
    command.args(["--files", "--no-require-git", "--glob", pattern]);

    let lines = run(command, root, collect_limit, cancel).await?;
    Ok(lines
        .into_iter()
        .map(|line| {
            let path = resolve(root, &line);
            FileInfo {
                modified: modified(&path),
                path,
            }
        })
        .collect())
}

/// Spawn ripgrep rooted at `root` and collect up to `collect_limit` stdout
/// lines, killing the process on cancellation or once the limit is reached.
async fn run(
    mut command: Command,
    root: &Path,
    collect_limit: usize,
    cancel: &CancellationToken,
) -> Result<Vec<String>> {
    let mut child = command
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Ripgrep(format!("failed to spawn rg: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Ripgrep("rg stdout unavailable".into()))?;
    let mut reader = BufReader::new(stdout).lines();
    let mut lines = Vec::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                kill(&mut child).await;
                return Err(Error::Cancelled);
            }
            next = reader.next_line() => {
                match next {
                    Ok(Some(line)) => {
                        lines.push(line);
                        if lines.len() >= collect_limit {
                            kill(&mut child).await;
                            return Ok(lines);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        kill(&mut child).await;
                        return Err(Error::Ripgrep(format!("failed reading rg output: {e}")));
                    }
                }
            }
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| Error::Ripgrep(format!("rg did not exit cleanly: {e}")))?;
    // Exit code 1 means no matches, which is not an error
    match status.code() {
        Some(0) | Some(1) => Ok(lines),
        code => Err(Error::Ripgrep(format!("rg exited with status {code:?}"))),
    }
}

async fn kill(child: &mut Child) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}

fn resolve(root: &Path, path: &str) -> PathBuf {
    root.join(path.strip_prefix("./").unwrap_or(path))
}

fn modified(path: &Path) -> SystemTime {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

//! Loads working-tree changes from git for the diff viewer.
//!
//! The loader always produces a [`DiffData`]; failures are reported through
//! its `error_msg` so the viewer can show them in place.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use thiserror::Error;

use tern_types::{DiffData, DiffFile, DiffHunk, DiffStats};

/// Hunk lines kept per file before it is marked truncated.
pub const MAX_HUNK_LINES_PER_FILE: usize = 400;
/// Per-file diff text above this is not parsed.
pub const LARGE_FILE_BYTES: usize = 1024 * 1024;
/// Total diff text parsed across all files.
pub const MAX_TOTAL_DIFF_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_UNTRACKED_FILES: usize = 50;

/// Hash of the empty tree, used as the base before the first commit.
const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

#[derive(Debug, Error)]
pub enum DiffLoadError {
    #[error("Not a git repository")]
    NotARepo,
    #[error("A merge is in progress; resolve it before viewing the diff")]
    MergeInProgress,
    #[error("A rebase is in progress; finish it before viewing the diff")]
    RebaseInProgress,
    #[error("git {args} failed: {stderr}")]
    Git { args: String, stderr: String },
    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type DiffFuture<'a> = Pin<Box<dyn Future<Output = DiffData> + Send + 'a>>;

pub trait DiffLoader: Send + Sync {
    fn load<'a>(&'a self, cwd: &'a Path) -> DiffFuture<'a>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct GitDiffLoader;

impl DiffLoader for GitDiffLoader {
    fn load<'a>(&'a self, cwd: &'a Path) -> DiffFuture<'a> {
        Box::pin(async move {
            match load_git_diff(cwd).await {
                Ok(data) => data,
                Err(err) => {
                    tracing::info!(%err, "diff unavailable");
                    DiffData::error(err.to_string())
                }
            }
        })
    }
}

async fn git(cwd: &Path, args: &[&str]) -> Result<String, DiffLoadError> {
    let output = tokio::process::Command::new("git")
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(DiffLoadError::Spawn)?;
    if !output.status.success() {
        return Err(DiffLoadError::Git {
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub async fn load_git_diff(cwd: &Path) -> Result<DiffData, DiffLoadError> {
    let git_dir = git(cwd, &["rev-parse", "--git-dir"])
        .await
        .map_err(|_| DiffLoadError::NotARepo)?;
    let git_dir = cwd.join(PathBuf::from(git_dir.trim()));
    if git_dir.join("MERGE_HEAD").exists() {
        return Err(DiffLoadError::MergeInProgress);
    }
    if git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists() {
        return Err(DiffLoadError::RebaseInProgress);
    }

    let base = if git(cwd, &["rev-parse", "--verify", "--quiet", "HEAD"]).await.is_ok() {
        "HEAD"
    } else {
        EMPTY_TREE
    };

    let shortstat = git(cwd, &["diff", base, "--shortstat"]).await?;
    let mut stats = parse_shortstat(&shortstat);
    let numstat = git(cwd, &["diff", base, "--numstat"]).await?;
    let mut files = parse_numstat(&numstat);

    let mut data = DiffData::default();
    let mut budget = MAX_TOTAL_DIFF_BYTES;
    for file in &mut files {
        if file.is_binary {
            continue;
        }
        if budget == 0 {
            file.is_truncated = true;
            continue;
        }
        let text = git(cwd, &["diff", base, "-U3", "--", &file.path]).await?;
        if text.len() > LARGE_FILE_BYTES {
            file.is_large_file = true;
            continue;
        }
        budget = budget.saturating_sub(text.len());
        let (hunks, truncated) = parse_hunks(&text, MAX_HUNK_LINES_PER_FILE);
        file.is_truncated = truncated;
        data.hunks.insert(file.path.clone(), hunks);
    }

    let untracked = git(cwd, &["ls-files", "--others", "--exclude-standard"]).await?;
    for path in untracked.lines().filter(|l| !l.is_empty()).take(MAX_UNTRACKED_FILES) {
        let file = untracked_file(cwd, path);
        stats.lines_added += file.lines_added;
        files.push(file);
    }

    stats.files_count = files.len();
    data.stats = stats;
    data.files = files;
    Ok(data)
}

fn untracked_file(cwd: &Path, path: &str) -> DiffFile {
    let mut file = DiffFile {
        path: path.to_string(),
        is_untracked: true,
        ..DiffFile::default()
    };
    match std::fs::read(cwd.join(path)) {
        Ok(bytes) if bytes.len() > LARGE_FILE_BYTES => file.is_large_file = true,
        Ok(bytes) if bytes.contains(&0) => file.is_binary = true,
        Ok(bytes) => file.lines_added = bytes.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count(),
        Err(err) => tracing::debug!(path, %err, "unreadable untracked file"),
    }
    file
}

/// Parses `git diff --shortstat`: `3 files changed, 10 insertions(+), 2 deletions(-)`.
#[must_use]
pub fn parse_shortstat(raw: &str) -> DiffStats {
    let mut stats = DiffStats::default();
    for part in raw.trim().split(',') {
        let mut words = part.split_whitespace();
        let Some(count) = words.next().and_then(|n| n.parse::<usize>().ok()) else {
            continue;
        };
        match words.next() {
            Some(w) if w.starts_with("file") => stats.files_count = count,
            Some(w) if w.starts_with("insertion") => stats.lines_added = count,
            Some(w) if w.starts_with("deletion") => stats.lines_removed = count,
            _ => {}
        }
    }
    stats
}

/// Parses `git diff --numstat`. Binary files report `-` for both counts.
#[must_use]
pub fn parse_numstat(raw: &str) -> Vec<DiffFile> {
    raw.lines()
        .filter_map(|line| {
            let mut cols = line.splitn(3, '\t');
            let added = cols.next()?;
            let removed = cols.next()?;
            let path = cols.next()?.to_string();
            let is_binary = added == "-" && removed == "-";
            Some(DiffFile {
                path,
                lines_added: added.parse().unwrap_or(0),
                lines_removed: removed.parse().unwrap_or(0),
                is_binary,
                ..DiffFile::default()
            })
        })
        .collect()
}

/// Splits unified diff text into hunks, keeping at most `max_lines` body
/// lines. Returns whether anything was dropped.
#[must_use]
pub fn parse_hunks(raw: &str, max_lines: usize) -> (Vec<DiffHunk>, bool) {
    let mut hunks: Vec<DiffHunk> = Vec::new();
    let mut kept = 0usize;
    let mut truncated = false;
    for line in raw.lines() {
        if let Some(hunk) = parse_hunk_header(line) {
            if kept >= max_lines {
                truncated = true;
                break;
            }
            hunks.push(hunk);
            continue;
        }
        let Some(current) = hunks.last_mut() else {
            continue;
        };
        if !line.starts_with([' ', '+', '-', '\\']) {
            continue;
        }
        if kept >= max_lines {
            truncated = true;
            break;
        }
        current.lines.push(line.to_string());
        kept += 1;
    }
    (hunks, truncated)
}

fn parse_hunk_header(line: &str) -> Option<DiffHunk> {
    let rest = line.strip_prefix("@@ -")?;
    let end = rest.find(" @@")?;
    let mut ranges = rest[..end].split(" +");
    let (old_start, old_lines) = parse_range(ranges.next()?)?;
    let (new_start, new_lines) = parse_range(ranges.next()?)?;
    Some(DiffHunk {
        old_start,
        old_lines,
        new_start,
        new_lines,
        lines: Vec::new(),
    })
}

fn parse_range(raw: &str) -> Option<(usize, usize)> {
    match raw.split_once(',') {
        Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
        None => Some((raw.parse().ok()?, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_hunks, parse_numstat, parse_shortstat};

    const SAMPLE: &str = "\
diff --git a/src/lib.rs b/src/lib.rs
index 111..222 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,3 +1,4 @@
 use std::fmt;
-fn old() {}
+fn new() {}
+fn extra() {}

@@ -20 +21,2 @@ impl Foo {
+    bar();
 }
";

    #[test]
    fn shortstat_counts() {
        let stats = parse_shortstat(" 3 files changed, 10 insertions(+), 2 deletions(-)\n");
        assert_eq!((stats.files_count, stats.lines_added, stats.lines_removed), (3, 10, 2));
        let only_adds = parse_shortstat(" 1 file changed, 1 insertion(+)");
        assert_eq!((only_adds.files_count, only_adds.lines_added, only_adds.lines_removed), (1, 1, 0));
    }

    #[test]
    fn numstat_marks_binary() {
        let files = parse_numstat("4\t1\tsrc/main.rs\n-\t-\tlogo.png\n");
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].lines_added, 4);
        assert_eq!(files[0].lines_removed, 1);
        assert!(!files[0].is_binary);
        assert!(files[1].is_binary);
    }

    #[test]
    fn hunks_are_split_on_headers() {
        let (hunks, truncated) = parse_hunks(SAMPLE, 400);
        assert!(!truncated);
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].header(), "@@ -1,3 +1,4 @@");
        assert_eq!(hunks[0].lines.len(), 4);
        assert_eq!((hunks[1].old_start, hunks[1].old_lines), (20, 1));
        assert_eq!(hunks[1].lines, vec!["+    bar();", " }"]);
    }

    #[test]
    fn hunk_lines_are_capped() {
        let (hunks, truncated) = parse_hunks(SAMPLE, 3);
        assert!(truncated);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].lines.len(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_repo_reports_error() {
        if std::process::Command::new("git").arg("--version").output().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let data = super::GitDiffLoader;
        let loaded = super::DiffLoader::load(&data, dir.path()).await;
        assert_eq!(loaded.error_msg.as_deref(), Some("Not a git repository"));
    }
}

//! Patch utilities shared by the summarizer and the rule-engine oracle.
//!
//! This module provides:
//! - `FileChange`, one file touched by a pull request
//! - Line type classification (Added, Removed, Context, Header)
//! - Change blocks: runs of removed/added lines between context lines
//! - Unified diff parsing for local mode (`git diff` output)

pub mod summary;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub use summary::{summarize, DiffBundle, MISSING_PATCH_PLACEHOLDER, TRUNCATION_MARKER};

/// One file touched by a pull request.
///
/// Field names follow the GitHub "list pull request files" response, so the
/// API payload deserializes directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    #[serde(rename = "filename", alias = "path")]
    pub path: String,
    /// Vocabulary supplied by the hosting API (added, modified, removed, renamed, ...)
    pub status: String,
    pub additions: u32,
    pub deletions: u32,
    /// Absent for binary files and patches the API declined to render.
    #[serde(default)]
    pub patch: Option<String>,
}

impl FileChange {
    pub fn new(
        path: impl Into<String>,
        status: impl Into<String>,
        additions: u32,
        deletions: u32,
        patch: Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            status: status.into(),
            additions,
            deletions,
            patch,
        }
    }

    /// Build a modified-file entry from patch text, counting +/- lines.
    pub fn from_patch(path: impl Into<String>, patch: impl Into<String>) -> Self {
        let patch = patch.into();
        let (additions, deletions) = count_changes(&patch);
        Self::new(path, "modified", additions, deletions, Some(patch))
    }

    pub fn is_removed(&self) -> bool {
        self.status == "removed"
    }

    pub fn is_added(&self) -> bool {
        self.status == "added"
    }

    /// Lowercased file name without directories.
    pub fn file_name(&self) -> String {
        self.path
            .rsplit('/')
            .next()
            .unwrap_or(&self.path)
            .to_ascii_lowercase()
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Some(ext.to_string())
    }
}

/// Represents the type of a line in a diff patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineType {
    /// Line added in the new version (starts with +)
    Added,
    /// Line removed from the old version (starts with -)
    Removed,
    /// Context line, unchanged (starts with space)
    Context,
    /// Hunk header (@@ ... @@)
    Header,
    /// Metadata lines (diff --, +++, index, etc.)
    Meta,
}

/// Classify a line and extract its content without the prefix.
///
/// Context-free: `+++`/`---` count as file headers. Inside a hunk body use
/// [`patch_lines`], where those are ordinary added/removed lines.
pub fn classify_line(line: &str) -> (LineType, &str) {
    if line.starts_with("@@") {
        (LineType::Header, line)
    } else if line.starts_with("+++")
        || line.starts_with("---")
        || line.starts_with("diff ")
        || line.starts_with("index ")
        || line.starts_with('\\')
    {
        // "\ No newline at end of file" is metadata too
        (LineType::Meta, line)
    } else {
        classify_body_line(line)
    }
}

/// A line inside a hunk body. Only the first character decides.
fn classify_body_line(line: &str) -> (LineType, &str) {
    if line.starts_with('\\') {
        (LineType::Meta, line)
    } else if let Some(content) = line.strip_prefix('+') {
        (LineType::Added, content)
    } else if let Some(content) = line.strip_prefix('-') {
        (LineType::Removed, content)
    } else if let Some(content) = line.strip_prefix(' ') {
        (LineType::Context, content)
    } else {
        // Lines without prefix (shouldn't happen in valid patches, but handle gracefully)
        (LineType::Context, line)
    }
}

/// Classify every line of a patch, tracking hunk state.
///
/// File headers only exist before the first `@@`; after it, `+++x;` is an
/// added `++x;` and `--- a` is a removed `-- a`.
pub fn patch_lines(patch: &str) -> impl Iterator<Item = (LineType, &str)> {
    let mut in_hunk = false;
    patch.lines().map(move |line| {
        if line.starts_with("@@") {
            in_hunk = true;
            (LineType::Header, line)
        } else if in_hunk {
            classify_body_line(line)
        } else {
            classify_line(line)
        }
    })
}

/// Count added and removed lines in a patch.
pub fn count_changes(patch: &str) -> (u32, u32) {
    patch_lines(patch).fold((0, 0), |(adds, dels), (kind, _)| match kind {
        LineType::Added => (adds + 1, dels),
        LineType::Removed => (adds, dels + 1),
        _ => (adds, dels),
    })
}

/// A maximal run of removed and/or added lines, delimited by context lines or
/// hunk headers. Removed lines are the old side, added lines the new side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBlock<'a> {
    pub removed: Vec<&'a str>,
    pub added: Vec<&'a str>,
}

impl ChangeBlock<'_> {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.removed.len() + self.added.len()
    }
}

/// Split a patch into change blocks.
pub fn change_blocks(patch: &str) -> Vec<ChangeBlock<'_>> {
    let mut blocks = Vec::new();
    let mut current = ChangeBlock::default();

    for line in patch_lines(patch) {
        match line {
            (LineType::Added, content) => current.added.push(content),
            (LineType::Removed, content) => current.removed.push(content),
            (LineType::Meta, _) => {}
            (LineType::Header, _) | (LineType::Context, _) => {
                if !current.is_empty() {
                    blocks.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Parse a unified diff (`git diff` output) into file changes, in diff order.
///
/// Each entry's `patch` starts at its first `@@` header, matching the shape the
/// GitHub API returns. Binary files get no patch.
pub fn parse_unified_diff(unified_diff: &str) -> Vec<FileChange> {
    let mut files = Vec::new();
    let mut current: Option<PendingFile> = None;

    for line in unified_diff.lines() {
        if line.starts_with("diff --git ") {
            if let Some(pending) = current.take() {
                files.extend(pending.finish());
            }
            current = Some(PendingFile::new(extract_filename(line)));
            continue;
        }

        let Some(pending) = current.as_mut() else {
            continue;
        };

        if pending.in_hunks {
            pending.hunks.push(line);
            continue;
        }

        if line.starts_with("@@") {
            pending.in_hunks = true;
            pending.hunks.push(line);
        } else if line.starts_with("new file mode") {
            pending.status = "added";
        } else if line.starts_with("deleted file mode") {
            pending.status = "removed";
        } else if let Some(rest) = line.strip_prefix("rename to ") {
            pending.status = "renamed";
            pending.filename = Some(rest.to_string());
        } else if line.starts_with("Binary files ") {
            pending.binary = true;
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            if rest != "/dev/null" {
                pending.filename = strip_diff_prefix(rest).or(pending.filename.take());
            }
        } else if let Some(rest) = line.strip_prefix("--- ") {
            if rest != "/dev/null" && pending.filename.is_none() {
                pending.filename = strip_diff_prefix(rest);
            }
        }
    }

    if let Some(pending) = current {
        files.extend(pending.finish());
    }
    files
}

struct PendingFile<'a> {
    filename: Option<String>,
    status: &'static str,
    binary: bool,
    in_hunks: bool,
    hunks: Vec<&'a str>,
}

impl<'a> PendingFile<'a> {
    fn new(filename: Option<String>) -> Self {
        Self {
            filename,
            status: "modified",
            binary: false,
            in_hunks: false,
            hunks: Vec::new(),
        }
    }

    fn finish(self) -> Option<FileChange> {
        let Some(path) = self.filename else {
            warn!("Skipping diff section without a resolvable filename");
            return None;
        };
        let patch = (!self.binary && !self.hunks.is_empty()).then(|| self.hunks.join("\n"));
        let (additions, deletions) = patch.as_deref().map(count_changes).unwrap_or((0, 0));
        Some(FileChange::new(
            path,
            self.status,
            additions,
            deletions,
            patch,
        ))
    }
}

/// Strip the single-char diff prefix (a/, b/, w/, etc.) from a --- or +++ path.
fn strip_diff_prefix(path: &str) -> Option<String> {
    if path.len() >= 2 && path.as_bytes()[1] == b'/' {
        Some(path[2..].to_string())
    } else {
        Some(path.to_string())
    }
}

/// Extract filename from a "diff --git" line
///
/// Returns the new-side path. Returns `None` when the line is ambiguous
/// (renames with spaces); the caller falls back to `+++`/`---`/`rename to`.
fn extract_filename(git_diff_line: &str) -> Option<String> {
    let content = git_diff_line.strip_prefix("diff --git ")?;

    if content.len() < 2 || content.as_bytes()[1] != b'/' {
        warn!("Failed to parse git diff line: {}", git_diff_line);
        return None;
    }

    // Non-rename: "X/path Y/path" with identical paths
    let first_path = &content[2..];
    let total_len = first_path.len();
    if total_len >= 3 && (total_len - 3) % 2 == 0 {
        let path_len = (total_len - 3) / 2;
        let bytes = first_path.as_bytes();
        if path_len > 0 && bytes[path_len] == b' ' && bytes[path_len + 2] == b'/' {
            let path1 = &first_path[..path_len];
            let path2 = &first_path[path_len + 3..];
            if path1 == path2 {
                return Some(path2.to_string());
            }
        }
    }

    None
}

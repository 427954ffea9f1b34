//! Diff summarizer: renders a PR's file changes into one bounded document.

use serde::Serialize;

use super::FileChange;

/// Shown instead of a fenced patch when the hosting API supplied none.
pub const MISSING_PATCH_PLACEHOLDER: &str = "_(binary file or patch too large to display)_";

/// Appended after the text is cut to `max_diff_size` characters.
pub const TRUNCATION_MARKER: &str = "\n\n[... diff truncated: remaining changes omitted ...]";

/// The summarizer's output, consumed by the classification policy.
///
/// Aggregates always describe the full input, even when `text` was truncated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffBundle {
    pub text: String,
    pub file_count: usize,
    pub total_additions: u64,
    pub total_deletions: u64,
    pub truncated: bool,
    /// The input files, in supplied order. Not serialized into reports.
    #[serde(skip)]
    pub files: Vec<FileChange>,
}

/// Render `files` (in the given order) and cap the result at `max_diff_size`
/// characters.
pub fn summarize(files: &[FileChange], max_diff_size: usize) -> DiffBundle {
    let rendered = render(files);
    let (text, truncated) = cap_text(rendered, max_diff_size);

    DiffBundle {
        text,
        file_count: files.len(),
        total_additions: files.iter().map(|f| u64::from(f.additions)).sum(),
        total_deletions: files.iter().map(|f| u64::from(f.deletions)).sum(),
        truncated,
        files: files.to_vec(),
    }
}

fn render(files: &[FileChange]) -> String {
    let mut text = format!("# Changed files: {}\n", files.len());

    for file in files {
        text.push_str(&format!(
            "\n## {} ({}, +{} -{})\n",
            file.path, file.status, file.additions, file.deletions
        ));
        match file.patch.as_deref() {
            Some(patch) => {
                text.push_str("```diff\n");
                text.push_str(patch);
                if !patch.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str("```\n");
            }
            None => {
                text.push_str(MISSING_PATCH_PLACEHOLDER);
                text.push('\n');
            }
        }
    }

    text
}

/// Cut to exactly `max_chars` characters, then append the marker.
fn cap_text(text: String, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        None => (text, false),
        Some((byte_end, _)) => {
            let mut capped = String::with_capacity(byte_end + TRUNCATION_MARKER.len());
            capped.push_str(&text[..byte_end]);
            capped.push_str(TRUNCATION_MARKER);
            (capped, true)
        }
    }
}

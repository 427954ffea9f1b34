use crate::diff::DiffBundle;

/// The category table, decision procedure and response contract.
pub const DEFAULT_RUBRIC: &str = include_str!("defaults/classifier.md");

/// User message carrying the rendered diff and its aggregates.
pub fn build_user_message(bundle: &DiffBundle) -> String {
    let truncation_note = if bundle.truncated {
        "\nNOTE: the diff below was truncated. Content you cannot see cannot be placed in a category.\n"
    } else {
        ""
    };

    format!(
        r#"Classify this pull request.

Files changed: {files}
Lines added: {additions}
Lines removed: {deletions}
{truncation_note}
{diff}

Respond with a single JSON object as described in the instructions."#,
        files = bundle.file_count,
        additions = bundle.total_additions,
        deletions = bundle.total_deletions,
        truncation_note = truncation_note,
        diff = bundle.text,
    )
}

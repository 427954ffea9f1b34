//! What a run leaves behind: CI step outputs, the JSON summary on stdout, and
//! the PR comment body.

use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::context::PrRef;
use crate::error::{Result, SkipReviewError};
use crate::policy::Verdict;
use crate::run::{RunOutcome, RunStats};

const OUTPUT_DELIMITER: &str = "SKIP_REVIEW_EOF";

/// Named step outputs: `eligible`, `confidence`, `category`, `reasoning`.
pub fn ci_outputs(verdict: &Verdict) -> Vec<(&'static str, String)> {
    vec![
        ("eligible", verdict.eligible.to_string()),
        ("confidence", verdict.confidence.to_string()),
        ("category", verdict.category_list()),
        ("reasoning", verdict.reasoning.clone()),
    ]
}

/// `$GITHUB_OUTPUT` file format. Multi-line values use the heredoc form with
/// a delimiter that does not occur in the value.
pub fn render_github_output(outputs: &[(&str, String)]) -> String {
    let mut out = String::new();
    for (key, value) in outputs {
        if !value.contains('\n') && !value.contains('\r') {
            out.push_str(&format!("{key}={value}\n"));
            continue;
        }
        let mut delimiter = OUTPUT_DELIMITER.to_string();
        let mut n = 0;
        while value.contains(&delimiter) {
            n += 1;
            delimiter = format!("{OUTPUT_DELIMITER}_{n}");
        }
        out.push_str(&format!("{key}<<{delimiter}\n{value}\n{delimiter}\n"));
    }
    out
}

/// Append outputs to `$GITHUB_OUTPUT`. Outside Actions they go to stderr,
/// since stdout carries the JSON summary.
pub fn write_ci_outputs(verdict: &Verdict) -> Result<()> {
    let rendered = render_github_output(&ci_outputs(verdict));
    match env::var_os("GITHUB_OUTPUT").filter(|p| !p.is_empty()) {
        Some(path) => append_outputs(Path::new(&path), &rendered),
        None => {
            eprint!("{rendered}");
            Ok(())
        }
    }
}

fn append_outputs(path: &Path, rendered: &str) -> Result<()> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(rendered.as_bytes()))
        .map_err(|e| {
            SkipReviewError::CollaboratorIo(format!(
                "failed to write step outputs to {}: {e}",
                path.display()
            ))
        })
}

/// Fixed-template PR comment explaining why the label was applied.
pub fn render_comment(verdict: &Verdict, label: &str, oracle: &str) -> String {
    let categories = verdict
        .categories
        .iter()
        .map(|c| format!("`{}` ({})", c.as_str(), c.label()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut body = format!(
        "## Eligible to skip review\n\
         \n\
         This pull request was classified as low-risk and labeled `{label}`.\n\
         \n\
         | | |\n\
         |---|---|\n\
         | **Category** | {categories} |\n\
         | **Confidence** | {confidence}% |\n\
         \n\
         **Reasoning:** {reasoning}\n",
        confidence = verdict.confidence,
        reasoning = verdict.reasoning,
    );

    if !verdict.flags.is_empty() {
        body.push_str("\n**Please double check:**\n");
        for flag in &verdict.flags {
            body.push_str(&format!("- {flag}\n"));
        }
    }

    body.push_str(&format!(
        "\n<sub>Automated classification by skip-review ({oracle}). Remove the label to require a normal review.</sub>\n"
    ));
    body
}

/// Result kind for JSON output (serialized as snake_case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Eligible,
    NotEligible,
    Error,
}

/// JSON document written to stdout when a run ends.
#[derive(Debug, Serialize)]
pub struct JsonSummary<'a> {
    pub result: ResultKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr: Option<String>,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<&'a Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<&'a RunStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub analyzed_at: String,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn build_summary<'a>(
    outcome: &'a RunOutcome,
    pr: Option<&PrRef>,
    at: DateTime<Utc>,
) -> JsonSummary<'a> {
    let result = if outcome.verdict.eligible {
        ResultKind::Eligible
    } else {
        ResultKind::NotEligible
    };
    JsonSummary {
        result,
        pr: pr.map(PrRef::to_string),
        applied: outcome.applied,
        verdict: Some(&outcome.verdict),
        stats: Some(&outcome.stats),
        error_kind: None,
        message: None,
        analyzed_at: timestamp(at),
    }
}

pub fn build_error_summary(error: &SkipReviewError, at: DateTime<Utc>) -> JsonSummary<'static> {
    JsonSummary {
        result: ResultKind::Error,
        pr: None,
        applied: false,
        verdict: None,
        stats: None,
        error_kind: Some(error.kind()),
        message: Some(error.to_string()),
        analyzed_at: timestamp(at),
    }
}

/// Write JSON output to stdout with flush guarantee and broken pipe safety.
pub fn write_json_stdout(summary: &JsonSummary<'_>) {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    match serde_json::to_writer(&mut handle, summary) {
        Ok(()) => {
            let _ = writeln!(handle);
            let _ = handle.flush();
        }
        Err(e) => {
            tracing::error!(error = %e, "JSON serialization failed");
        }
    }
}

//! One analysis run: fetch, summarize, classify, gate, then label and comment.

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::PrRef;
use crate::diff::{summarize, DiffBundle, FileChange};
use crate::error::Result;
use crate::github::PullRequestHost;
use crate::output::{render_comment, write_ci_outputs};
use crate::policy::{classify, Oracle, Verdict};

/// Aggregates reported alongside the verdict. Counts cover every file, even
/// when the rendered diff was truncated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub files: usize,
    pub additions: u64,
    pub deletions: u64,
    pub truncated: bool,
}

impl From<&DiffBundle> for RunStats {
    fn from(bundle: &DiffBundle) -> Self {
        Self {
            files: bundle.file_count,
            additions: bundle.total_additions,
            deletions: bundle.total_deletions,
            truncated: bundle.truncated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub verdict: Verdict,
    pub stats: RunStats,
    /// Label was added
    pub applied: bool,
    pub commented: bool,
}

/// Summarize and classify a file list. No side effects.
pub async fn evaluate(
    oracle: &dyn Oracle,
    config: &Config,
    files: &[FileChange],
) -> Result<RunOutcome> {
    let bundle = summarize(files, config.max_diff_size);
    if bundle.truncated {
        warn!(
            limit = config.max_diff_size,
            files = bundle.file_count,
            "diff exceeds max size, oracle sees a truncated bundle"
        );
    }

    let verdict = classify(oracle, &bundle).await?;
    Ok(RunOutcome {
        verdict,
        stats: RunStats::from(&bundle),
        applied: false,
        commented: false,
    })
}

/// Full run against a hosted PR. Step outputs are written as soon as the
/// verdict is known, so a failed label or comment cannot lose them. Side
/// effects happen only after a valid verdict passes the threshold gate:
/// label first, then the comment.
pub async fn analyze_pr(
    host: &dyn PullRequestHost,
    oracle: &dyn Oracle,
    config: &Config,
    pr: &PrRef,
    dry_run: bool,
) -> Result<RunOutcome> {
    info!(pr = %pr, "Fetching changed files");
    let files = host.fetch_changed_files(pr).await?;

    let mut outcome = evaluate(oracle, config, &files).await?;
    write_ci_outputs(&outcome.verdict)?;

    if !outcome.verdict.should_apply(config.confidence_threshold) {
        info!(
            eligible = outcome.verdict.eligible,
            confidence = outcome.verdict.confidence,
            threshold = config.confidence_threshold,
            "Not applying label"
        );
        return Ok(outcome);
    }
    if dry_run {
        info!(label = %config.label_name, "Dry run: label and comment skipped");
        return Ok(outcome);
    }

    host.add_label(pr, &config.label_name).await?;
    outcome.applied = true;

    if config.add_comment {
        let body = render_comment(&outcome.verdict, &config.label_name, oracle.name());
        host.post_comment(pr, &body).await?;
        outcome.commented = true;
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credentials, FileConfig};
    use crate::error::SkipReviewError;
    use crate::policy::testing::StubOracle;
    use async_trait::async_trait;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records side effects in call order.
    struct FakeHost {
        files: Vec<FileChange>,
        events: Mutex<Vec<String>>,
        fail_comment: bool,
    }

    impl FakeHost {
        fn new() -> Self {
            Self {
                files: vec![FileChange::from_patch(
                    "src/a.js",
                    "@@ -1 +1 @@\n-// Calcualte\n+// Calculate",
                )],
                events: Mutex::new(Vec::new()),
                fail_comment: false,
            }
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PullRequestHost for FakeHost {
        async fn fetch_changed_files(&self, _pr: &PrRef) -> Result<Vec<FileChange>> {
            self.events.lock().unwrap().push("fetch".to_string());
            Ok(self.files.clone())
        }

        async fn add_label(&self, _pr: &PrRef, label: &str) -> Result<()> {
            self.events.lock().unwrap().push(format!("label:{label}"));
            Ok(())
        }

        async fn post_comment(&self, _pr: &PrRef, body: &str) -> Result<()> {
            if self.fail_comment {
                return Err(SkipReviewError::CollaboratorIo("comment rejected".to_string()));
            }
            self.events
                .lock()
                .unwrap()
                .push(format!("comment:{}", body.lines().next().unwrap_or("")));
            Ok(())
        }
    }

    fn config(add_comment: bool) -> Config {
        let layer = FileConfig {
            confidence_threshold: Some(80),
            add_comment: Some(add_comment),
            ..Default::default()
        };
        Config::from_layers(vec![layer], Credentials::default(), PathBuf::from(".")).unwrap()
    }

    fn pr() -> PrRef {
        PrRef {
            repo: "octo/app".to_string(),
            number: 7,
        }
    }

    fn answer(eligible: bool, confidence: u8) -> String {
        let categories = if eligible { "FixTypos" } else { "None" };
        format!(
            r#"{{"eligible":{eligible},"categories":["{categories}"],"confidence":{confidence},"reasoning":"comment typo"}}"#
        )
    }

    #[tokio::test]
    #[serial]
    async fn test_label_then_comment() {
        let host = FakeHost::new();
        let oracle = StubOracle::new(answer(true, 95));
        let outcome = analyze_pr(&host, &oracle, &config(true), &pr(), false)
            .await
            .unwrap();
        assert!(outcome.applied && outcome.commented);
        let events = host.events();
        assert_eq!(events[0], "fetch");
        assert_eq!(events[1], "label:skip-review");
        assert!(events[2].starts_with("comment:"));
        assert_eq!(outcome.stats.files, 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_below_threshold_has_no_side_effects() {
        let host = FakeHost::new();
        let oracle = StubOracle::new(answer(true, 79));
        let outcome = analyze_pr(&host, &oracle, &config(true), &pr(), false)
            .await
            .unwrap();
        assert!(outcome.verdict.eligible);
        assert!(!outcome.applied);
        assert_eq!(host.events(), vec!["fetch".to_string()]);
    }

    #[tokio::test]
    #[serial]
    async fn test_not_eligible_has_no_side_effects() {
        let host = FakeHost::new();
        let oracle = StubOracle::new(answer(false, 95));
        let outcome = analyze_pr(&host, &oracle, &config(true), &pr(), false)
            .await
            .unwrap();
        assert!(!outcome.applied);
        assert_eq!(host.events().len(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_comment_disabled() {
        let host = FakeHost::new();
        let oracle = StubOracle::new(answer(true, 90));
        let outcome = analyze_pr(&host, &oracle, &config(false), &pr(), false)
            .await
            .unwrap();
        assert!(outcome.applied && !outcome.commented);
        assert_eq!(host.events().len(), 2);
    }

    #[tokio::test]
    #[serial]
    async fn test_dry_run_skips_side_effects() {
        let host = FakeHost::new();
        let oracle = StubOracle::new(answer(true, 99));
        let outcome = analyze_pr(&host, &oracle, &config(true), &pr(), true)
            .await
            .unwrap();
        assert!(outcome.verdict.should_apply(80));
        assert!(!outcome.applied);
        assert_eq!(host.events().len(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_malformed_answer_aborts_before_side_effects() {
        let host = FakeHost::new();
        let oracle = StubOracle::new(r#"{"eligible":"yes","categories":["FixTypos"],"confidence":95,"reasoning":"x"}"#);
        let err = analyze_pr(&host, &oracle, &config(true), &pr(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, SkipReviewError::OracleSchema { .. }));
        assert_eq!(host.events().len(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_comment_failure_keeps_label() {
        let host = FakeHost {
            fail_comment: true,
            ..FakeHost::new()
        };
        let oracle = StubOracle::new(answer(true, 95));
        let err = analyze_pr(&host, &oracle, &config(true), &pr(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, SkipReviewError::CollaboratorIo(_)));
        assert_eq!(host.events()[1], "label:skip-review");
    }

    #[tokio::test]
    #[serial]
    async fn test_outputs_survive_a_failed_comment() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("github_output");
        env::set_var("GITHUB_OUTPUT", &output);
        let host = FakeHost {
            fail_comment: true,
            ..FakeHost::new()
        };
        let oracle = StubOracle::new(answer(true, 95));
        let result = analyze_pr(&host, &oracle, &config(true), &pr(), false).await;
        env::remove_var("GITHUB_OUTPUT");

        assert!(result.is_err());
        let written = fs::read_to_string(&output).unwrap();
        assert!(written.contains("eligible=true\n"));
        assert!(written.contains("confidence=95\n"));
    }

    #[tokio::test]
    #[serial]
    async fn test_unwritable_outputs_abort_before_label() {
        let dir = TempDir::new().unwrap();
        // a directory cannot be opened for append
        env::set_var("GITHUB_OUTPUT", dir.path());
        let host = FakeHost::new();
        let oracle = StubOracle::new(answer(true, 95));
        let result = analyze_pr(&host, &oracle, &config(true), &pr(), false).await;
        env::remove_var("GITHUB_OUTPUT");

        assert!(matches!(result, Err(SkipReviewError::CollaboratorIo(_))));
        assert_eq!(host.events(), vec!["fetch".to_string()]);
    }

    #[tokio::test]
    async fn test_evaluate_reports_untruncated_stats() {
        let files: Vec<FileChange> = (0..20)
            .map(|i| FileChange::from_patch(format!("docs/page{i}.md"), "@@ -1 +1 @@\n-teh\n+the"))
            .collect();
        let layer = FileConfig {
            max_diff_size: Some(100),
            ..Default::default()
        };
        let config =
            Config::from_layers(vec![layer], Credentials::default(), PathBuf::from(".")).unwrap();
        let oracle = StubOracle::new(answer(true, 95));
        let outcome = evaluate(&oracle, &config, &files).await.unwrap();
        assert!(outcome.stats.truncated);
        assert_eq!(outcome.stats.files, 20);
        assert_eq!(outcome.stats.additions, 20);
    }
}

//! Which pull request a run is about.

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::error::{Result, SkipReviewError};

/// `owner/repo` plus PR number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRef {
    pub repo: String,
    pub number: u64,
}

impl fmt::Display for PrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repo, self.number)
    }
}

#[derive(Debug, Deserialize)]
struct EventPullRequest {
    number: u64,
}

/// The subset of the Actions event payload we read.
#[derive(Debug, Deserialize)]
struct EventPayload {
    pull_request: Option<EventPullRequest>,
    /// `issue_comment` events carry the PR as an issue
    issue: Option<EventPullRequest>,
    number: Option<u64>,
}

impl PrRef {
    /// Resolve from explicit flags, falling back to the CI environment
    /// (`GITHUB_REPOSITORY`, and the PR number in the `GITHUB_EVENT_PATH`
    /// payload).
    pub fn resolve(repo: Option<&str>, number: Option<u64>) -> Result<Self> {
        let repo = match repo.map(str::to_string) {
            Some(repo) => repo,
            None => env::var("GITHUB_REPOSITORY").map_err(|_| {
                SkipReviewError::Configuration(
                    "repository is not set (use --repo or GITHUB_REPOSITORY)".to_string(),
                )
            })?,
        };
        validate_repo(&repo)?;

        let number = match number {
            Some(n) => n,
            None => {
                let path = env::var("GITHUB_EVENT_PATH").map_err(|_| {
                    SkipReviewError::Configuration(
                        "pull request number is not set (use --pr or run on a pull_request event)"
                            .to_string(),
                    )
                })?;
                number_from_event(Path::new(&path))?
            }
        };
        if number == 0 {
            return Err(SkipReviewError::Configuration(
                "pull request number must be positive".to_string(),
            ));
        }

        Ok(Self { repo, number })
    }
}

fn validate_repo(repo: &str) -> Result<()> {
    let valid = repo
        .split_once('/')
        .is_some_and(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'));
    if valid {
        Ok(())
    } else {
        Err(SkipReviewError::Configuration(format!(
            "repository must be owner/name, got '{repo}'"
        )))
    }
}

fn number_from_event(path: &Path) -> Result<u64> {
    let payload: EventPayload = fs::read_to_string(path)
        .with_context(|| format!("Failed to read event payload {}", path.display()))
        .and_then(|content| {
            serde_json::from_str(&content).context("Failed to parse event payload")
        })
        .map_err(|e| SkipReviewError::Configuration(format!("{e:#}")))?;

    payload
        .pull_request
        .or(payload.issue)
        .map(|pr| pr.number)
        .or(payload.number)
        .ok_or_else(|| {
            SkipReviewError::Configuration(
                "event payload has no pull request number (use --pr)".to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn event_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_explicit_flags_win() {
        env::set_var("GITHUB_REPOSITORY", "ci/other");
        let pr = PrRef::resolve(Some("octo/app"), Some(42)).unwrap();
        env::remove_var("GITHUB_REPOSITORY");
        assert_eq!(pr.repo, "octo/app");
        assert_eq!(pr.number, 42);
        assert_eq!(pr.to_string(), "octo/app#42");
    }

    #[test]
    #[serial]
    fn test_resolve_from_ci_environment() {
        let event = event_file(r#"{"action":"opened","pull_request":{"number":17,"title":"x"}}"#);
        env::set_var("GITHUB_REPOSITORY", "octo/app");
        env::set_var("GITHUB_EVENT_PATH", event.path());
        let pr = PrRef::resolve(None, None);
        env::remove_var("GITHUB_REPOSITORY");
        env::remove_var("GITHUB_EVENT_PATH");
        assert_eq!(
            pr.unwrap(),
            PrRef {
                repo: "octo/app".to_string(),
                number: 17
            }
        );
    }

    #[test]
    #[serial]
    fn test_missing_repo_is_configuration_error() {
        env::remove_var("GITHUB_REPOSITORY");
        assert!(matches!(
            PrRef::resolve(None, Some(1)),
            Err(SkipReviewError::Configuration(_))
        ));
    }

    #[test]
    #[serial]
    fn test_push_event_has_no_number() {
        let event = event_file(r#"{"ref":"refs/heads/main"}"#);
        env::set_var("GITHUB_EVENT_PATH", event.path());
        let result = PrRef::resolve(Some("octo/app"), None);
        env::remove_var("GITHUB_EVENT_PATH");
        assert!(matches!(result, Err(SkipReviewError::Configuration(_))));
    }

    #[test]
    fn test_repo_shape() {
        assert!(validate_repo("octo/app").is_ok());
        assert!(validate_repo("octo").is_err());
        assert!(validate_repo("/app").is_err());
        assert!(validate_repo("a/b/c").is_err());
    }
}

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info};

use super::client::{gh_api_paginate, gh_api_post};
use crate::context::PrRef;
use crate::diff::FileChange;
use crate::error::{Result, SkipReviewError};

/// The code-hosting collaborator: where changed files come from and where
/// the label and comment go.
#[async_trait]
pub trait PullRequestHost: Send + Sync {
    /// Changed files in the order the host lists them.
    async fn fetch_changed_files(&self, pr: &PrRef) -> Result<Vec<FileChange>>;

    async fn add_label(&self, pr: &PrRef, label: &str) -> Result<()>;

    async fn post_comment(&self, pr: &PrRef, body: &str) -> Result<()>;
}

/// GitHub via the `gh` CLI, authenticated with the configured token.
pub struct GhHost {
    token: String,
}

impl GhHost {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

fn collaborator_error(e: anyhow::Error) -> SkipReviewError {
    SkipReviewError::CollaboratorIo(format!("{e:#}"))
}

#[async_trait]
impl PullRequestHost for GhHost {
    async fn fetch_changed_files(&self, pr: &PrRef) -> Result<Vec<FileChange>> {
        let endpoint = format!("repos/{}/pulls/{}/files?per_page=100", pr.repo, pr.number);
        let items = gh_api_paginate(&self.token, &endpoint)
            .await
            .map_err(collaborator_error)?;

        let files: Vec<FileChange> = serde_json::from_value(serde_json::Value::Array(items))
            .context("Failed to parse changed files response")
            .map_err(collaborator_error)?;
        debug!(pr = %pr, files = files.len(), "fetched changed files");
        Ok(files)
    }

    async fn add_label(&self, pr: &PrRef, label: &str) -> Result<()> {
        let endpoint = format!("repos/{}/issues/{}/labels", pr.repo, pr.number);
        gh_api_post(&self.token, &endpoint, &[("labels[]", label)])
            .await
            .map_err(collaborator_error)?;
        info!(pr = %pr, label, "label added");
        Ok(())
    }

    async fn post_comment(&self, pr: &PrRef, body: &str) -> Result<()> {
        let endpoint = format!("repos/{}/issues/{}/comments", pr.repo, pr.number);
        gh_api_post(&self.token, &endpoint, &[("body", body)])
            .await
            .map_err(collaborator_error)?;
        info!(pr = %pr, "comment posted");
        Ok(())
    }
}

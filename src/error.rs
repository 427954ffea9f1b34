use thiserror::Error;

/// Fatal conditions for an analysis run. None of these are recovered locally:
/// the run aborts, no label or comment is applied, and the process exits non-zero.
#[derive(Debug, Error)]
pub enum SkipReviewError {
    /// Required credential, PR context, or setting is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The hosting API (file fetch, label, comment) failed.
    #[error("hosting API error: {0}")]
    CollaboratorIo(String),

    /// The inference endpoint failed at the transport/HTTP level.
    #[error("oracle request failed: {0}")]
    OracleIo(String),

    /// The oracle answered, but not with a usable verdict.
    #[error("oracle returned a malformed verdict: {reason} (response: {excerpt})")]
    OracleSchema { reason: String, excerpt: String },
}

impl SkipReviewError {
    pub fn schema(reason: impl Into<String>, raw: &str) -> Self {
        Self::OracleSchema {
            reason: reason.into(),
            excerpt: truncate_str(raw, 200),
        }
    }

    /// Short machine-readable kind, used in the JSON error document.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::CollaboratorIo(_) => "collaborator_io",
            Self::OracleIo(_) => "oracle_io",
            Self::OracleSchema { .. } => "oracle_schema",
        }
    }
}

pub type Result<T> = std::result::Result<T, SkipReviewError>;

/// Truncate to `max_chars` characters (not bytes), appending "..." when cut.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((byte_end, _)) => format!("{}...", &s[..byte_end]),
    }
}

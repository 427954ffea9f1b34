//! Classification policy: the category model, the verdict contract, and the
//! wrapper that turns any oracle's raw answer into a validated [`Verdict`].
//!
//! The oracle is an injectable strategy. Whatever produces the answer (the
//! chat-completions endpoint, the rule engine, a test stub), its output goes
//! through the same structural validation before anyone acts on it.

pub mod category;
pub mod rubric;
pub mod verdict;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::diff::DiffBundle;
use crate::error::Result;

pub use category::Category;
pub use verdict::{Verdict, MAX_CATEGORIES};

/// Anything that can judge a diff bundle against the rubric.
///
/// Implementations return the raw answer text; they do not validate it.
#[async_trait]
pub trait Oracle: Send + Sync {
    fn name(&self) -> &str;

    async fn judge(&self, bundle: &DiffBundle) -> Result<String>;
}

/// Ask the oracle once and validate its answer.
pub async fn classify(oracle: &dyn Oracle, bundle: &DiffBundle) -> Result<Verdict> {
    debug!(
        oracle = oracle.name(),
        files = bundle.file_count,
        chars = bundle.text.len(),
        truncated = bundle.truncated,
        "classify: start"
    );

    let raw = oracle.judge(bundle).await?;
    let verdict = Verdict::from_oracle_text(&raw)?;

    info!(
        oracle = oracle.name(),
        eligible = verdict.eligible,
        categories = %verdict.category_list(),
        confidence = verdict.confidence,
        "classify: verdict"
    );
    Ok(verdict)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Oracle stub that replays a fixed answer and counts calls.
    pub struct StubOracle {
        answer: String,
        pub calls: AtomicUsize,
    }

    impl StubOracle {
        pub fn new(answer: impl Into<String>) -> Self {
            Self {
                answer: answer.into(),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Oracle for StubOracle {
        fn name(&self) -> &str {
            "stub"
        }

        async fn judge(&self, _bundle: &DiffBundle) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubOracle;
    use super::*;
    use crate::diff::{summarize, FileChange};
    use crate::error::SkipReviewError;

    fn bundle() -> DiffBundle {
        summarize(&[FileChange::from_patch("a.md", "@@ -1 +1 @@\n-teh\n+the")], 1000)
    }

    #[tokio::test]
    async fn test_classify_validates_answer() {
        let oracle = StubOracle::new(
            r#"{"eligible":true,"categories":["FixTypos"],"confidence":95,"reasoning":"typo"}"#,
        );
        let verdict = classify(&oracle, &bundle()).await.unwrap();
        assert!(verdict.eligible);
        assert_eq!(oracle.call_count(), 1);
    }

    #[tokio::test]
    async fn test_classify_rejects_malformed_answer() {
        let oracle = StubOracle::new(
            r#"{"eligible":true,"categories":[],"confidence":95,"reasoning":"typo"}"#,
        );
        let err = classify(&oracle, &bundle()).await.unwrap_err();
        assert!(matches!(err, SkipReviewError::OracleSchema { .. }));
    }
}

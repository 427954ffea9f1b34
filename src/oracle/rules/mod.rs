//! Deterministic rule-engine oracle.
//!
//! Every changed file is routed by path to a rule family (`paths`), judged
//! line by line (`judge`, `deps`), and the per-file judgements are folded into
//! one verdict with the classification procedure's veto and calibration rules.
//! The engine answers in the same JSON shape an LLM would, so its output goes
//! through the same validation.

mod deps;
mod judge;
mod paths;
mod text;

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

use crate::diff::{DiffBundle, FileChange};
use crate::error::{Result, SkipReviewError};
use crate::policy::{Category, Oracle, Verdict, MAX_CATEGORIES};

pub(crate) const CLEAN_CONFIDENCE: u8 = 95;
pub(crate) const BORDERLINE_CONFIDENCE: u8 = 82;
/// Lost per category beyond the first.
pub(crate) const CATEGORY_PENALTY: u8 = 5;

pub(crate) const DISQUALIFIED_CONFIDENCE: u8 = 30;
pub(crate) const TOO_MANY_CATEGORIES_CONFIDENCE: u8 = 40;
pub(crate) const UNPLACEABLE_CONFIDENCE: u8 = 20;

/// Changed content attributed to one category. `flag` marks a borderline fit
/// and carries the caveat an auditor should check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Contribution {
    pub category: Category,
    pub weight: usize,
    pub flag: Option<String>,
}

impl Contribution {
    pub fn clean(category: Category, weight: usize) -> Self {
        Self {
            category,
            weight,
            flag: None,
        }
    }

    pub fn borderline(category: Category, weight: usize, flag: impl Into<String>) -> Self {
        Self {
            category,
            weight,
            flag: Some(flag.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FileJudgement {
    /// All of the file's changes fit these categories.
    Fits(Vec<Contribution>),
    /// Logic, behavior, config or test change: vetoes the whole PR.
    Disqualified(String),
    /// Content that cannot be confidently placed in any category.
    Unplaceable(String),
    /// Version and hash churn of existing lockfile entries, acceptable only
    /// alongside a manifest version bump.
    PendingLockfile {
        patch_missing: bool,
        flags: Vec<String>,
    },
}

#[derive(Debug, Default, Clone, Copy)]
struct CategoryTotals {
    weight: usize,
    files: usize,
}

/// Rule-based oracle. Needs no network and no credentials.
#[derive(Debug, Default, Clone)]
pub struct RuleOracle;

impl RuleOracle {
    pub fn new() -> Self {
        Self
    }

    /// Judge the full file list. Truncation of the rendered bundle does not
    /// matter here: the rules read every file's patch.
    pub fn evaluate(&self, files: &[FileChange]) -> Verdict {
        if files.is_empty() {
            return Verdict::not_eligible(
                UNPLACEABLE_CONFIDENCE,
                "The pull request has no changed files to classify.",
                Vec::new(),
            );
        }

        let mut disqualified = Vec::new();
        let mut unplaceable = Vec::new();
        let mut lockfiles = Vec::new();
        let mut totals: BTreeMap<Category, CategoryTotals> = BTreeMap::new();
        let mut flags: Vec<String> = Vec::new();

        for file in files {
            let judgement = judge::judge_file(file);
            debug!(path = %file.path, ?judgement, "rules: judged file");
            match judgement {
                FileJudgement::Disqualified(reason) => disqualified.push(reason),
                FileJudgement::Unplaceable(reason) => unplaceable.push(reason),
                FileJudgement::PendingLockfile {
                    patch_missing,
                    flags: lock_flags,
                } => {
                    lockfiles.push((file.path.as_str(), patch_missing));
                    for flag in lock_flags {
                        if !flags.contains(&flag) {
                            flags.push(flag);
                        }
                    }
                }
                FileJudgement::Fits(contributions) => {
                    let mut seen = Vec::new();
                    for contribution in contributions {
                        let entry = totals.entry(contribution.category).or_default();
                        entry.weight += contribution.weight;
                        if !seen.contains(&contribution.category) {
                            entry.files += 1;
                            seen.push(contribution.category);
                        }
                        if let Some(flag) = contribution.flag {
                            if !flags.contains(&flag) {
                                flags.push(flag);
                            }
                        }
                    }
                }
            }
        }

        if let Some(first) = disqualified.first() {
            let more = match disqualified.len() {
                1 => String::new(),
                n => format!(" ({} more disqualifying changes)", n - 1),
            };
            return Verdict::not_eligible(
                DISQUALIFIED_CONFIDENCE,
                format!("Not eligible: {first}{more}. One disqualifying change disqualifies the whole PR."),
                disqualified,
            );
        }

        let has_bump = totals.contains_key(&Category::SafeDependencyBump);
        if !lockfiles.is_empty() && !has_bump {
            unplaceable.push("lockfile changes without a manifest version bump".to_string());
        }
        if totals.is_empty() && unplaceable.is_empty() {
            unplaceable.push("no classifiable content in the diff".to_string());
        }
        if let Some(first) = unplaceable.first() {
            return Verdict::not_eligible(
                UNPLACEABLE_CONFIDENCE,
                format!("Not eligible: {first}; not every change can be placed in a category."),
                unplaceable,
            );
        }

        for (path, patch_missing) in &lockfiles {
            if *patch_missing {
                flags.push(format!("lockfile {path} has no patch and was not inspected"));
            }
        }

        let mut ranked: Vec<(Category, CategoryTotals)> = totals.into_iter().collect();
        // BTreeMap order is declaration order; the stable sort keeps it for ties
        ranked.sort_by(|a, b| b.1.weight.cmp(&a.1.weight));

        if ranked.len() > MAX_CATEGORIES {
            let names = ranked
                .iter()
                .map(|(c, _)| c.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            return Verdict::not_eligible(
                TOO_MANY_CATEGORIES_CONFIDENCE,
                format!(
                    "Not eligible: changes span {} categories ({names}), more than {MAX_CATEGORIES}.",
                    ranked.len()
                ),
                flags,
            );
        }
        if has_bump && ranked.len() > 1 {
            return Verdict::not_eligible(
                DISQUALIFIED_CONFIDENCE,
                "Not eligible: a dependency bump is bundled with other changes.",
                flags,
            );
        }

        let base = if flags.is_empty() {
            CLEAN_CONFIDENCE
        } else {
            BORDERLINE_CONFIDENCE
        };
        let extra = u8::try_from(ranked.len() - 1).unwrap_or(u8::MAX);
        let confidence = base.saturating_sub(CATEGORY_PENALTY.saturating_mul(extra));

        let breakdown = ranked
            .iter()
            .map(|(category, t)| {
                let files = if t.files == 1 { "file" } else { "files" };
                format!("{category} ({} changed lines in {} {files})", t.weight, t.files)
            })
            .collect::<Vec<_>>()
            .join(", ");

        Verdict {
            eligible: true,
            categories: ranked.into_iter().map(|(c, _)| c).collect(),
            confidence,
            reasoning: format!("Every changed line fits the admitted categories: {breakdown}."),
            flags,
        }
    }
}

#[async_trait]
impl Oracle for RuleOracle {
    fn name(&self) -> &str {
        "rules"
    }

    async fn judge(&self, bundle: &DiffBundle) -> Result<String> {
        let verdict = self.evaluate(&bundle.files);
        serde_json::to_string(&verdict)
            .map_err(|e| SkipReviewError::OracleIo(format!("failed to encode rule verdict: {e}")))
    }
}

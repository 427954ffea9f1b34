use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;

use super::category::Category;
use crate::error::{Result, SkipReviewError};

/// Maximum categories a verdict may name (dominant first).
pub const MAX_CATEGORIES: usize = 3;

pub type Categories = SmallVec<[Category; MAX_CATEGORIES]>;

/// A structurally valid classification result.
///
/// Invariants (enforced by [`Verdict::from_value`]):
/// - `eligible == false` ⇔ `categories == [None]`
/// - eligible verdicts name 1..=3 distinct non-`None` categories
/// - `confidence` is in `0..=100`
/// - `reasoning` is non-empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub eligible: bool,
    pub categories: Categories,
    pub confidence: u8,
    pub reasoning: String,
    pub flags: Vec<String>,
}

impl Verdict {
    /// The not-eligible verdict: categories are always exactly `[None]`.
    pub fn not_eligible(confidence: u8, reasoning: impl Into<String>, flags: Vec<String>) -> Self {
        Self {
            eligible: false,
            categories: smallvec::smallvec![Category::None],
            confidence: confidence.min(100),
            reasoning: reasoning.into(),
            flags,
        }
    }

    /// Label and comment are applied only when this holds.
    pub fn should_apply(&self, confidence_threshold: u8) -> bool {
        self.eligible && self.confidence >= confidence_threshold
    }

    pub fn dominant(&self) -> Category {
        self.categories.first().copied().unwrap_or(Category::None)
    }

    /// Comma-joined category names, for CI outputs.
    pub fn category_list(&self) -> String {
        self.categories
            .iter()
            .map(Category::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse an oracle's raw text answer. Tolerates a surrounding ```json fence
    /// or prose around a single JSON object.
    pub fn from_oracle_text(raw: &str) -> Result<Self> {
        let json = extract_json_object(raw)
            .ok_or_else(|| SkipReviewError::schema("response contains no JSON object", raw))?;
        let value: Value = serde_json::from_str(json)
            .map_err(|e| SkipReviewError::schema(format!("invalid JSON: {e}"), raw))?;
        Self::from_value(&value)
    }

    /// Structural validation of a candidate verdict. Nothing is coerced: a
    /// candidate that breaks the contract is an `OracleSchema` error.
    pub fn from_value(value: &Value) -> Result<Self> {
        let raw = value.to_string();
        let fail = |reason: &str| SkipReviewError::schema(reason, &raw);

        let obj = value
            .as_object()
            .ok_or_else(|| fail("verdict is not a JSON object"))?;

        let eligible = match obj.get("eligible") {
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(fail("`eligible` is not a boolean")),
            None => return Err(fail("`eligible` is missing")),
        };

        let confidence = match obj.get("confidence") {
            Some(Value::Number(n)) => {
                // 79.5 must not round up past an 80 threshold
                let c = n.as_f64().unwrap_or(f64::NAN);
                if c.fract() != 0.0 {
                    return Err(fail("`confidence` is not an integer"));
                }
                if !(0.0..=100.0).contains(&c) {
                    return Err(fail("`confidence` is outside 0..=100"));
                }
                c as u8
            }
            Some(_) => return Err(fail("`confidence` is not a number")),
            None => return Err(fail("`confidence` is missing")),
        };

        let reasoning = match obj.get("reasoning") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::String(_)) => return Err(fail("`reasoning` is empty")),
            Some(_) => return Err(fail("`reasoning` is not a string")),
            None => return Err(fail("`reasoning` is missing")),
        };

        // Older rubric revisions answered with a single `category` string
        let names = match obj.get("categories").or_else(|| obj.get("category")) {
            Some(Value::String(s)) if !s.trim().is_empty() => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>(),
            Some(Value::Array(items)) if !items.is_empty() => items
                .iter()
                .map(|item| match item {
                    Value::String(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
                    _ => Err(fail("`categories` contains a non-string or empty entry")),
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(fail(
                    "`categories` must be a non-empty string or a non-empty array of strings",
                ))
            }
            None => return Err(fail("`categories` is missing")),
        };

        let mut categories = Categories::new();
        for name in &names {
            let category: Category = name
                .parse()
                .map_err(|e: super::category::UnknownCategory| fail(&e.to_string()))?;
            if categories.contains(&category) {
                return Err(fail(&format!("category '{category}' is listed twice")));
            }
            categories.push(category);
        }

        if eligible {
            if categories.iter().any(Category::is_none) {
                return Err(fail("eligible verdict names the None category"));
            }
            if categories.len() > MAX_CATEGORIES {
                return Err(fail("eligible verdict names more than three categories"));
            }
        } else if categories.as_slice() != [Category::None] {
            return Err(fail("not-eligible verdict must name exactly [None]"));
        }

        let flags = match obj.get("flags") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| fail("`flags` contains a non-string entry"))
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(fail("`flags` is not an array")),
        };

        Ok(Self {
            eligible,
            categories,
            confidence,
            reasoning,
            flags,
        })
    }
}

/// Locate the outermost `{ ... }` span in `text`.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assert_schema_error(value: Value) {
        match Verdict::from_value(&value) {
            Err(SkipReviewError::OracleSchema { .. }) => {}
            other => panic!("expected OracleSchema error for {value}, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_eligible_verdict() {
        let verdict = Verdict::from_value(&json!({
            "eligible": true,
            "categories": ["FixTypos", "CodeFormatting"],
            "confidence": 88,
            "reasoning": "Comment typo fixes and whitespace only.",
            "flags": ["touches README"]
        }))
        .unwrap();
        assert!(verdict.eligible);
        assert_eq!(
            verdict.categories.as_slice(),
            [Category::FixTypos, Category::CodeFormatting]
        );
        assert_eq!(verdict.dominant(), Category::FixTypos);
        assert_eq!(verdict.category_list(), "FixTypos,CodeFormatting");
        assert_eq!(verdict.flags, vec!["touches README"]);
    }

    #[test]
    fn test_single_category_string_is_accepted() {
        let verdict = Verdict::from_value(&json!({
            "eligible": true,
            "category": "safe-dependency-bump",
            "confidence": 92,
            "reasoning": "Patch bump."
        }))
        .unwrap();
        assert_eq!(verdict.categories.as_slice(), [Category::SafeDependencyBump]);
        assert_eq!(verdict.confidence, 92);
        assert!(verdict.flags.is_empty());
    }

    #[test]
    fn test_fractional_confidence_is_rejected() {
        for confidence in [json!(79.5), json!(92.4)] {
            let err = Verdict::from_value(&json!({
                "eligible": true,
                "categories": ["fix-typos"],
                "confidence": confidence,
                "reasoning": "Comment typo."
            }))
            .unwrap_err();
            assert!(
                matches!(&err, SkipReviewError::OracleSchema { reason, .. } if reason.contains("integer"))
            );
        }

        let verdict = Verdict::from_value(&json!({
            "eligible": true,
            "categories": ["fix-typos"],
            "confidence": 80.0,
            "reasoning": "Comment typo."
        }))
        .unwrap();
        assert_eq!(verdict.confidence, 80);
    }

    #[test]
    fn test_comma_joined_string_is_split() {
        let verdict = Verdict::from_value(&json!({
            "eligible": true,
            "categories": "FixTypos, UpdateUiStyle",
            "confidence": 80,
            "reasoning": "ok"
        }))
        .unwrap();
        assert_eq!(
            verdict.categories.as_slice(),
            [Category::FixTypos, Category::UpdateUiStyle]
        );
    }

    #[test]
    fn test_not_eligible_verdict() {
        let verdict = Verdict::from_value(&json!({
            "eligible": false,
            "categories": ["None"],
            "confidence": 30,
            "reasoning": "Validation logic changed."
        }))
        .unwrap();
        assert!(!verdict.eligible);
        assert_eq!(verdict.categories.as_slice(), [Category::None]);
    }

    #[test]
    fn test_rejects_empty_categories() {
        assert_schema_error(json!({
            "eligible": true, "categories": [], "confidence": 90, "reasoning": "x"
        }));
        assert_schema_error(json!({
            "eligible": true, "categories": "  ", "confidence": 90, "reasoning": "x"
        }));
    }

    #[test]
    fn test_rejects_non_boolean_eligible() {
        assert_schema_error(json!({
            "eligible": "true", "categories": ["FixTypos"], "confidence": 90, "reasoning": "x"
        }));
        assert_schema_error(json!({
            "categories": ["FixTypos"], "confidence": 90, "reasoning": "x"
        }));
    }

    #[test]
    fn test_rejects_missing_or_empty_reasoning() {
        assert_schema_error(json!({
            "eligible": true, "categories": ["FixTypos"], "confidence": 90
        }));
        assert_schema_error(json!({
            "eligible": true, "categories": ["FixTypos"], "confidence": 90, "reasoning": "   "
        }));
    }

    #[test]
    fn test_rejects_bad_confidence() {
        assert_schema_error(json!({
            "eligible": true, "categories": ["FixTypos"], "confidence": "95", "reasoning": "x"
        }));
        assert_schema_error(json!({
            "eligible": true, "categories": ["FixTypos"], "confidence": 101, "reasoning": "x"
        }));
        assert_schema_error(json!({
            "eligible": true, "categories": ["FixTypos"], "confidence": -1, "reasoning": "x"
        }));
    }

    #[test]
    fn test_rejects_not_eligible_with_leftover_categories() {
        assert_schema_error(json!({
            "eligible": false, "categories": ["FixTypos"], "confidence": 40, "reasoning": "x"
        }));
        assert_schema_error(json!({
            "eligible": false, "categories": ["None", "FixTypos"], "confidence": 40, "reasoning": "x"
        }));
    }

    #[test]
    fn test_rejects_eligible_with_none_or_too_many() {
        assert_schema_error(json!({
            "eligible": true, "categories": ["None"], "confidence": 90, "reasoning": "x"
        }));
        assert_schema_error(json!({
            "eligible": true,
            "categories": ["FixTypos", "CodeFormatting", "UpdateUiStyle", "UpdateI18nKey"],
            "confidence": 90,
            "reasoning": "x"
        }));
    }

    #[test]
    fn test_rejects_unknown_and_duplicate_categories() {
        assert_schema_error(json!({
            "eligible": true, "categories": ["Refactor"], "confidence": 90, "reasoning": "x"
        }));
        assert_schema_error(json!({
            "eligible": true, "categories": ["FixTypos", "fix-typos"], "confidence": 90, "reasoning": "x"
        }));
    }

    #[test]
    fn test_rejects_bad_flags() {
        assert_schema_error(json!({
            "eligible": true, "categories": ["FixTypos"], "confidence": 90, "reasoning": "x",
            "flags": "touches config"
        }));
        assert_schema_error(json!({
            "eligible": true, "categories": ["FixTypos"], "confidence": 90, "reasoning": "x",
            "flags": [1]
        }));
    }

    #[test]
    fn test_from_oracle_text_with_fence() {
        let raw = "Here you go:\n```json\n{\"eligible\": false, \"categories\": [\"None\"], \"confidence\": 20, \"reasoning\": \"logic\"}\n```";
        let verdict = Verdict::from_oracle_text(raw).unwrap();
        assert!(!verdict.eligible);
    }

    #[test]
    fn test_from_oracle_text_rejects_garbage() {
        assert!(matches!(
            Verdict::from_oracle_text("I think it is fine"),
            Err(SkipReviewError::OracleSchema { .. })
        ));
        assert!(matches!(
            Verdict::from_oracle_text("{\"eligible\": true,"),
            Err(SkipReviewError::OracleSchema { .. })
        ));
    }

    #[test]
    fn test_threshold_gate() {
        let verdict = Verdict {
            eligible: true,
            categories: smallvec::smallvec![Category::FixTypos],
            confidence: 79,
            reasoning: "typo".to_string(),
            flags: vec![],
        };
        assert!(!verdict.should_apply(80));
        assert!(verdict.should_apply(79));

        let not_eligible = Verdict::not_eligible(100, "logic", vec![]);
        assert!(!not_eligible.should_apply(0));
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The closed set of low-risk edit categories, plus `None`.
///
/// Variant order is the declaration order used to break dominance ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    FixTypos,
    UpdateI18nKey,
    UpdateUiStyle,
    CodeFormatting,
    RemoveUnusedCode,
    SafeDependencyBump,
    None,
}

impl Category {
    /// Every category that can make a PR eligible, in declaration order.
    pub const ELIGIBLE: [Category; 6] = [
        Category::FixTypos,
        Category::UpdateI18nKey,
        Category::UpdateUiStyle,
        Category::CodeFormatting,
        Category::RemoveUnusedCode,
        Category::SafeDependencyBump,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::FixTypos => "FixTypos",
            Category::UpdateI18nKey => "UpdateI18nKey",
            Category::UpdateUiStyle => "UpdateUiStyle",
            Category::CodeFormatting => "CodeFormatting",
            Category::RemoveUnusedCode => "RemoveUnusedCode",
            Category::SafeDependencyBump => "SafeDependencyBump",
            Category::None => "None",
        }
    }

    /// Human label used in PR comments.
    pub fn label(&self) -> &'static str {
        match self {
            Category::FixTypos => "Typo fix",
            Category::UpdateI18nKey => "i18n key update",
            Category::UpdateUiStyle => "UI style update",
            Category::CodeFormatting => "Code formatting",
            Category::RemoveUnusedCode => "Unused code removal",
            Category::SafeDependencyBump => "Safe dependency bump",
            Category::None => "None",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Category::None)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Accepts `FixTypos`, `fix-typos`, `fix_typos`, `Fix Typos` and so on.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        let category = match key.as_str() {
            "fixtypos" | "fixtypo" | "typo" | "typos" => Category::FixTypos,
            "updatei18nkey" | "updatei18nkeys" | "i18n" => Category::UpdateI18nKey,
            "updateuistyle" | "uistyle" | "style" => Category::UpdateUiStyle,
            "codeformatting" | "formatting" => Category::CodeFormatting,
            "removeunusedcode" | "deadcode" => Category::RemoveUnusedCode,
            "safedependencybump" | "dependencybump" => Category::SafeDependencyBump,
            "none" => Category::None,
            _ => return Err(UnknownCategory(s.trim().to_string())),
        };
        Ok(category)
    }
}

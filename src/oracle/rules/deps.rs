//! Dependency manifest rules.
//!
//! Removed and added manifest lines are paired by their *template*: the line
//! with every version and hash token replaced by a placeholder. A paired line
//! is a version change of the same entry; an unpaired line adds or removes one.

use std::cmp::Ordering;
use std::fmt;

use phf::phf_set;

use super::{Contribution, FileJudgement};
use crate::diff::{change_blocks, FileChange};
use crate::policy::Category;

/// Keys that pin a language runtime or package manager rather than a dependency.
static TOOLCHAIN_KEYS: phf::Set<&'static str> = phf_set! {
    "node",
    "npm",
    "yarn",
    "pnpm",
    "engines",
    "packagemanager",
    "volta",
    "rust-version",
    "edition",
    "toolchain",
    "go",
    "python",
    "python_requires",
    "requires-python",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Version {
    parts: Vec<u64>,
    pre: Option<String>,
}

impl Version {
    fn major(&self) -> u64 {
        self.parts.first().copied().unwrap_or(0)
    }

    fn minor(&self) -> u64 {
        self.parts.get(1).copied().unwrap_or(0)
    }

    fn compare(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .parts
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        match &self.pre {
            Some(pre) => write!(f, "{joined}-{pre}"),
            None => f.write_str(&joined),
        }
    }
}

/// A manifest line reduced to its template plus the version tokens it held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tokenized {
    pub template: String,
    pub versions: Vec<Version>,
}

fn is_hash_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')
}

/// Replace version tokens (`1.2`, `4.17.21-rc.1`) with `\u{1}` and hash
/// tokens (20+ chars of base64/hex with both letters and digits) with `\u{2}`.
pub(crate) fn tokenize(line: &str) -> Tokenized {
    let chars: Vec<char> = line.trim_end().chars().collect();
    let mut template = String::with_capacity(chars.len());
    let mut versions = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let run = chars[i..].iter().take_while(|c| is_hash_char(**c)).count();
        let run_chars = &chars[i..i + run];
        if run >= 20
            && run_chars.iter().any(char::is_ascii_digit)
            && run_chars.iter().any(char::is_ascii_alphabetic)
        {
            template.push('\u{2}');
            i += run;
            continue;
        }

        if chars[i].is_ascii_digit() {
            if let Some((version, len)) = parse_version(&chars[i..]) {
                template.push('\u{1}');
                versions.push(version);
                i += len;
                continue;
            }
        }

        template.push(chars[i]);
        i += 1;
    }

    Tokenized { template, versions }
}

/// `\d+(\.\d+)+` with an optional `-prerelease` suffix. Returns the version
/// and the number of chars consumed.
fn parse_version(chars: &[char]) -> Option<(Version, usize)> {
    let digits = |from: usize| chars[from..].iter().take_while(|c| c.is_ascii_digit()).count();

    let mut parts = Vec::new();
    let mut i = 0;
    loop {
        let n = digits(i);
        if n == 0 {
            break;
        }
        let part: String = chars[i..i + n].iter().collect();
        parts.push(part.parse::<u64>().unwrap_or(u64::MAX));
        i += n;
        if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(char::is_ascii_digit) {
            i += 1;
        } else {
            break;
        }
    }
    if parts.len() < 2 {
        return None;
    }

    let mut pre = None;
    if chars.get(i) == Some(&'-') {
        let tail = chars[i + 1..]
            .iter()
            .take_while(|c| c.is_ascii_alphanumeric() || **c == '.')
            .count();
        let candidate: String = chars[i + 1..i + 1 + tail].iter().collect();
        let candidate = candidate.trim_end_matches('.').to_string();
        if candidate.chars().any(|c| c.is_ascii_alphabetic()) {
            i += 1 + candidate.chars().count();
            pre = Some(candidate);
        }
    }

    Some((Version { parts, pre }, i))
}

/// The entry name a manifest line assigns to (`"lodash"`, `serde`, `django`,
/// `go`).
fn line_key(line: &str) -> String {
    line.trim()
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| {
            !c.is_whitespace() && !matches!(c, '"' | '\'' | ':' | '=' | '<' | '>' | '~' | '!' | '[' | '@')
        })
        .collect::<String>()
        .to_ascii_lowercase()
}

enum BumpCheck {
    Unchanged,
    Safe { prerelease: bool },
    Unsafe(String),
}

fn check_bump(key: &str, old: &Version, new: &Version) -> BumpCheck {
    match old.compare(new) {
        Ordering::Equal => return BumpCheck::Unchanged,
        Ordering::Greater => return BumpCheck::Unsafe(format!("downgrades `{key}` from {old} to {new}")),
        Ordering::Less => {}
    }
    if old.major() != new.major() {
        return BumpCheck::Unsafe(format!("major version bump of `{key}` ({old} → {new})"));
    }
    if old.major() == 0 && old.minor() != new.minor() {
        return BumpCheck::Unsafe(format!("breaking 0.x bump of `{key}` ({old} → {new})"));
    }
    BumpCheck::Safe {
        prerelease: new.pre.is_some(),
    }
}

pub(crate) fn judge_manifest(file: &FileChange, patch: &str) -> FileJudgement {
    let mut bumps = 0usize;
    let mut flags = Vec::new();

    for block in change_blocks(patch) {
        let removed = tokenized_lines(&block.removed);
        let added = tokenized_lines(&block.added);

        let mut used = vec![false; added.len()];
        for (old_line, old) in &removed {
            let Some(j) = (0..added.len()).find(|&j| !used[j] && added[j].1.template == old.template)
            else {
                return FileJudgement::Disqualified(format!(
                    "adds or removes a dependency in {}",
                    file.path
                ));
            };
            used[j] = true;
            let new = &added[j].1;

            let key = line_key(old_line);
            if TOOLCHAIN_KEYS.contains(key.as_str()) {
                return FileJudgement::Disqualified(format!(
                    "toolchain bump (`{key}`) in {}",
                    file.path
                ));
            }
            if key == "version" {
                return FileJudgement::Unplaceable(format!(
                    "changes the package's own version in {}",
                    file.path
                ));
            }

            let mut changed = false;
            for (ov, nv) in old.versions.iter().zip(&new.versions) {
                match check_bump(&key, ov, nv) {
                    BumpCheck::Unchanged => {}
                    BumpCheck::Unsafe(reason) => {
                        return FileJudgement::Disqualified(format!("{reason} in {}", file.path));
                    }
                    BumpCheck::Safe { prerelease } => {
                        changed = true;
                        if prerelease {
                            flags.push(format!("`{key}` moves to a prerelease ({nv})"));
                        }
                    }
                }
            }
            if !changed {
                return FileJudgement::Unplaceable(format!(
                    "edits a dependency line without changing its version in {}",
                    file.path
                ));
            }
            bumps += 1;
        }

        if used.iter().any(|u| !u) {
            return FileJudgement::Disqualified(format!(
                "adds or removes a dependency in {}",
                file.path
            ));
        }
    }

    if bumps == 0 {
        return FileJudgement::Unplaceable(format!("no version change found in {}", file.path));
    }
    let contribution = if flags.is_empty() {
        Contribution::clean(Category::SafeDependencyBump, bumps)
    } else {
        Contribution::borderline(Category::SafeDependencyBump, bumps, flags.join("; "))
    };
    FileJudgement::Fits(vec![contribution])
}

/// Lockfile churn is acceptable only as version and hash updates of entries
/// that already exist: every removed line must pair with an added line of
/// the same template, and versions may only move forward within a major.
pub(crate) fn judge_lockfile(file: &FileChange, patch: &str) -> FileJudgement {
    let mut flags = Vec::new();
    let unpaired = || {
        FileJudgement::Disqualified(format!("adds or removes a locked package in {}", file.path))
    };

    for block in change_blocks(patch) {
        let removed = tokenized_lines(&block.removed);
        let added = tokenized_lines(&block.added);

        let mut used = vec![false; added.len()];
        for (old_line, old) in &removed {
            let Some(j) = (0..added.len()).find(|&j| !used[j] && added[j].1.template == old.template)
            else {
                return unpaired();
            };
            used[j] = true;

            let key = line_key(old_line);
            for (ov, nv) in old.versions.iter().zip(&added[j].1.versions) {
                match check_bump(&key, ov, nv) {
                    BumpCheck::Unchanged => {}
                    BumpCheck::Unsafe(reason) => {
                        return FileJudgement::Disqualified(format!("{reason} in {}", file.path));
                    }
                    BumpCheck::Safe { prerelease: true } => {
                        flags.push(format!("{} locks a prerelease ({nv})", file.path));
                    }
                    BumpCheck::Safe { prerelease: false } => {}
                }
            }
        }
        if used.iter().any(|u| !u) {
            return unpaired();
        }
    }

    FileJudgement::PendingLockfile {
        patch_missing: false,
        flags,
    }
}

fn tokenized_lines<'a>(lines: &[&'a str]) -> Vec<(&'a str, Tokenized)> {
    lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| (*l, tokenize(l)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(patch: &str) -> FileJudgement {
        let file = FileChange::from_patch("package.json", patch);
        judge_manifest(&file, patch)
    }

    #[test]
    fn test_tokenize_versions_and_hashes() {
        let t = tokenize(r#"    "lodash": "^4.17.20","#);
        assert_eq!(t.template, "    \"lodash\": \"^\u{1}\",");
        assert_eq!(t.versions.len(), 1);
        assert_eq!(t.versions[0].to_string(), "4.17.20");

        let t = tokenize(r#"      "integrity": "sha512-PlhdFcillOINfeV7Ni6oF1TAEayyZBoZ8bcshTHqOYJYlrqzRK5hDwyTRRf2ARDGtB3a4VRXPO5gYPyPyzHNw==","#);
        assert!(t.template.contains('\u{2}'));
        assert!(t.versions.is_empty());

        let t = tokenize("react-dom@18.2.0-rc.1");
        assert_eq!(t.versions[0].to_string(), "18.2.0-rc.1");

        // single numbers are not versions
        assert!(tokenize("port = 8080").versions.is_empty());
    }

    #[test]
    fn test_version_ordering() {
        let v = |s: &str| tokenize(s).versions.remove(0);
        assert_eq!(v("1.2.3").compare(&v("1.2.10")), Ordering::Less);
        assert_eq!(v("1.2").compare(&v("1.2.0")), Ordering::Equal);
        assert_eq!(v("1.2.0-beta").compare(&v("1.2.0")), Ordering::Less);
    }

    #[test]
    fn test_patch_bump_fits() {
        let judgement = manifest(
            "@@ -10,3 +10,3 @@\n   \"dependencies\": {\n-    \"lodash\": \"^4.17.20\",\n+    \"lodash\": \"^4.17.21\",\n   }",
        );
        assert_eq!(
            judgement,
            FileJudgement::Fits(vec![Contribution::clean(Category::SafeDependencyBump, 1)])
        );
    }

    #[test]
    fn test_major_bump_disqualifies() {
        let judgement = manifest("@@ -1 +1 @@\n-    \"react\": \"^17.0.2\",\n+    \"react\": \"^18.2.0\",");
        assert!(matches!(judgement, FileJudgement::Disqualified(r) if r.contains("major")));
    }

    #[test]
    fn test_zero_minor_bump_disqualifies() {
        let judgement = manifest("@@ -1 +1 @@\n-tokio = \"0.2.1\"\n+tokio = \"0.3.0\"");
        assert!(matches!(judgement, FileJudgement::Disqualified(_)));
    }

    #[test]
    fn test_downgrade_disqualifies() {
        let judgement = manifest("@@ -1 +1 @@\n-    \"lodash\": \"4.17.21\",\n+    \"lodash\": \"4.17.20\",");
        assert!(matches!(judgement, FileJudgement::Disqualified(r) if r.contains("downgrades")));
    }

    #[test]
    fn test_added_dependency_disqualifies() {
        let judgement = manifest("@@ -1,2 +1,3 @@\n   \"dependencies\": {\n+    \"left-pad\": \"1.3.0\",\n     \"lodash\": \"4.17.21\"");
        assert!(matches!(judgement, FileJudgement::Disqualified(r) if r.contains("adds or removes")));
    }

    #[test]
    fn test_toolchain_bump_disqualifies() {
        let judgement = manifest("@@ -1 +1 @@\n-    \"node\": \">=18.0.0\"\n+    \"node\": \">=20.0.0\"");
        assert!(matches!(judgement, FileJudgement::Disqualified(r) if r.contains("toolchain")));

        let patch = "@@ -1 +1 @@\n-go 1.21.0\n+go 1.21.5";
        let judgement = judge_manifest(&FileChange::from_patch("go.mod", patch), patch);
        assert!(matches!(judgement, FileJudgement::Disqualified(_)));
    }

    #[test]
    fn test_own_version_is_unplaceable() {
        let judgement = manifest("@@ -1 +1 @@\n-  \"version\": \"1.0.0\",\n+  \"version\": \"1.0.1\",");
        assert!(matches!(judgement, FileJudgement::Unplaceable(_)));
    }

    #[test]
    fn test_prerelease_is_borderline() {
        let judgement = manifest("@@ -1 +1 @@\n-    \"vite\": \"5.0.0\",\n+    \"vite\": \"5.1.0-beta.2\",");
        match judgement {
            FileJudgement::Fits(contributions) => {
                assert!(contributions[0].flag.as_deref().unwrap().contains("prerelease"));
            }
            other => panic!("unexpected judgement: {other:?}"),
        }
    }

    fn lockfile(patch: &str) -> FileJudgement {
        let file = FileChange::from_patch("package-lock.json", patch);
        judge_lockfile(&file, patch)
    }

    const LODASH_LOCK: &str = "@@ -10,9 +10,9 @@\n     \"node_modules/lodash\": {\n-      \"version\": \"4.17.20\",\n-      \"resolved\": \"https://registry.npmjs.org/lodash/-/lodash-4.17.20.tgz\",\n-      \"integrity\": \"sha512-PlhdFcillOINfeV7Ni6oF1TAEayyZBoZ8bcshTHqOYJYlrqzRK5hDwyTRRf2ARDGtB3a4VRXPO5gYPyPyzHNw==\"\n+      \"version\": \"4.17.21\",\n+      \"resolved\": \"https://registry.npmjs.org/lodash/-/lodash-4.17.21.tgz\",\n+      \"integrity\": \"sha512-v2kDEe57lecTulaDIuNTPy3Ry4gLGJ6Z1O3vE1krgXZNrsQ+LFTGHVxVjcXPs17LhbZVGedAJv8XZ1tvj5FvSg==\"\n     },";

    #[test]
    fn test_lockfile_version_and_hash_churn() {
        assert_eq!(
            lockfile(LODASH_LOCK),
            FileJudgement::PendingLockfile {
                patch_missing: false,
                flags: vec![]
            }
        );
    }

    #[test]
    fn test_lockfile_new_package_disqualifies() {
        let patch = "@@ -10,3 +10,8 @@\n     },\n+    \"node_modules/evil-postinstall\": {\n+      \"version\": \"1.0.0\",\n+      \"hasInstallScript\": true\n+    },\n     \"node_modules/lodash\": {";
        assert!(matches!(lockfile(patch), FileJudgement::Disqualified(r) if r.contains("locked package")));
    }

    #[test]
    fn test_lockfile_major_bump_disqualifies() {
        let patch = "@@ -20,3 +20,3 @@\n     \"node_modules/react\": {\n-      \"version\": \"18.3.1\",\n+      \"version\": \"19.0.0\",";
        assert!(matches!(lockfile(patch), FileJudgement::Disqualified(r) if r.contains("major")));
    }

    #[test]
    fn test_lockfile_removed_package_disqualifies() {
        let patch = "@@ -5,4 +5,2 @@\n-    \"node_modules/left-pad\": {\n-      \"version\": \"1.3.0\"\n     },";
        assert!(matches!(lockfile(patch), FileJudgement::Disqualified(_)));
    }
}

//! Per-file rules: map one changed file to the categories its content fits.

use std::collections::HashSet;

use super::deps::{judge_lockfile, judge_manifest};
use super::paths::{has_optional_semicolons, path_kind, uses_hash_comments, PathKind};
use super::text::{
    classify_style_property, declaration_parts, diff_region, expand_to_words, is_identifier_typo,
    is_import_line, is_typo_region, is_word_char, kebab_case, normalize_for_format, scan_spans,
    span_containing, Region, Span, SpanKind, StyleEdit, Syntax,
};
use super::{Contribution, FileJudgement};
use crate::diff::{change_blocks, ChangeBlock, FileChange};
use crate::policy::Category;

/// Outcome for one paired (removed, added) line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineVerdict {
    Same,
    Fits(Category, Option<String>),
    Disqualified(String),
    Unplaceable(String),
}

/// Accumulates a file's contributions. A disqualification outranks an
/// unplaceable change, which outranks any fit.
#[derive(Debug, Default)]
struct FileTally {
    contributions: Vec<Contribution>,
    disqualified: Option<String>,
    unplaceable: Option<String>,
}

impl FileTally {
    fn fit(&mut self, category: Category, weight: usize) {
        self.contributions
            .push(Contribution::clean(category, weight.max(1)));
    }

    fn fit_borderline(&mut self, category: Category, weight: usize, flag: impl Into<String>) {
        self.contributions
            .push(Contribution::borderline(category, weight.max(1), flag));
    }

    fn disqualify(&mut self, reason: impl Into<String>) {
        self.disqualified.get_or_insert_with(|| reason.into());
    }

    fn unplace(&mut self, reason: impl Into<String>) {
        self.unplaceable.get_or_insert_with(|| reason.into());
    }

    fn record(&mut self, verdict: LineVerdict, path: &str) {
        match verdict {
            LineVerdict::Same => {}
            LineVerdict::Fits(category, None) => self.fit(category, 1),
            LineVerdict::Fits(category, Some(flag)) => self.fit_borderline(category, 1, flag),
            LineVerdict::Disqualified(reason) => self.disqualify(format!("{reason} in {path}")),
            LineVerdict::Unplaceable(reason) => self.unplace(format!("{reason} in {path}")),
        }
    }

    fn finish(self) -> FileJudgement {
        if let Some(reason) = self.disqualified {
            FileJudgement::Disqualified(reason)
        } else if let Some(reason) = self.unplaceable {
            FileJudgement::Unplaceable(reason)
        } else {
            FileJudgement::Fits(self.contributions)
        }
    }
}

pub(crate) fn judge_file(file: &FileChange) -> FileJudgement {
    let kind = path_kind(file);
    let path = file.path.as_str();

    match kind {
        PathKind::Test => return FileJudgement::Disqualified(format!("touches test file {path}")),
        PathKind::Config => {
            return FileJudgement::Disqualified(format!("touches config file {path}"))
        }
        _ => {}
    }
    if file.status == "renamed" {
        return FileJudgement::Disqualified(format!("renames or moves {path}"));
    }
    if file.is_added() && kind != PathKind::Locale {
        return FileJudgement::Disqualified(format!("adds new file {path}"));
    }
    if kind == PathKind::Lockfile {
        return match file.patch.as_deref() {
            Some(patch) => judge_lockfile(file, patch),
            None => FileJudgement::PendingLockfile {
                patch_missing: true,
                flags: Vec::new(),
            },
        };
    }
    if file.is_removed() && kind == PathKind::Source {
        return judge_removed_source(file);
    }

    let Some(patch) = file.patch.as_deref() else {
        return FileJudgement::Unplaceable(format!("no patch available for {path}"));
    };

    match kind {
        PathKind::Manifest => judge_manifest(file, patch),
        PathKind::Locale => judge_locale(file, patch),
        PathKind::Stylesheet => judge_stylesheet(file, patch),
        PathKind::Docs => judge_docs(file, patch),
        _ => judge_source(file, patch),
    }
}

fn non_blank<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    lines
        .iter()
        .copied()
        .filter(|l| !l.trim().is_empty())
        .collect()
}

fn sorted_trimmed(lines: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = lines.iter().map(|l| l.trim().to_string()).collect();
    out.sort();
    out
}

// ---------------------------------------------------------------------------
// Source code
// ---------------------------------------------------------------------------

fn judge_source(file: &FileChange, patch: &str) -> FileJudgement {
    let syntax = Syntax {
        hash_comments: uses_hash_comments(file),
        prose: false,
    };
    let semis = has_optional_semicolons(file);
    let mut tally = FileTally::default();

    let mut blocks = change_blocks(patch);
    take_reordered_imports(&mut blocks, &mut tally);

    for block in blocks.iter().filter(|b| !b.is_empty()) {
        judge_source_block(&file.path, block, syntax, semis, &mut tally);
    }
    tally.finish()
}

/// Import lines that moved within the file (same multiset removed and added)
/// are an ordering change. They are taken out of the blocks so the rest of
/// each block is judged on its own.
fn take_reordered_imports(blocks: &mut [ChangeBlock<'_>], tally: &mut FileTally) {
    let removed: Vec<&str> = blocks
        .iter()
        .flat_map(|b| b.removed.iter().copied())
        .filter(|l| is_import_line(l))
        .collect();
    let added: Vec<&str> = blocks
        .iter()
        .flat_map(|b| b.added.iter().copied())
        .filter(|l| is_import_line(l))
        .collect();

    if removed.is_empty() || sorted_trimmed(&removed) != sorted_trimmed(&added) {
        return;
    }
    for block in blocks.iter_mut() {
        block.removed.retain(|l| !is_import_line(l));
        block.added.retain(|l| !is_import_line(l));
    }
    tally.fit(Category::CodeFormatting, removed.len() + added.len());
}

fn judge_source_block(
    path: &str,
    block: &ChangeBlock<'_>,
    syntax: Syntax,
    semis: bool,
    tally: &mut FileTally,
) {
    let removed = non_blank(&block.removed);
    let added = non_blank(&block.added);

    if removed.is_empty() && added.is_empty() {
        tally.fit(Category::CodeFormatting, block.line_count());
        return;
    }
    if added.is_empty() {
        if is_top_level_declarations(&removed, syntax) {
            tally.fit_borderline(
                Category::RemoveUnusedCode,
                removed.len(),
                format!("ambiguous dead-code removal in {path}"),
            );
        } else {
            tally.disqualify(format!("deletes statements from live code in {path}"));
        }
        return;
    }
    if normalize_for_format(&removed, syntax, semis) == normalize_for_format(&added, syntax, semis)
        || sorted_trimmed(&removed) == sorted_trimmed(&added)
    {
        tally.fit(Category::CodeFormatting, block.line_count());
        return;
    }
    if removed.is_empty() {
        if added.iter().all(|l| is_comment_line(l, syntax)) {
            tally.unplace(format!("adds comments to {path}"));
        } else {
            tally.disqualify(format!("adds new code to {path}"));
        }
        return;
    }
    if removed.len() != added.len() {
        tally.disqualify(format!("rewrites code in {path}"));
        return;
    }

    for (old, new) in removed.iter().zip(&added) {
        let verdict = judge_source_line(old, new, syntax, semis);
        tally.record(verdict, path);
    }
}

/// A deleted source file passes only when everything it held is whole
/// top-level declarations; anything else may have been running at import.
fn judge_removed_source(file: &FileChange) -> FileJudgement {
    let path = file.path.as_str();
    let Some(patch) = file.patch.as_deref() else {
        return FileJudgement::Unplaceable(format!(
            "deletes {path}, whose content is not available"
        ));
    };
    let syntax = Syntax {
        hash_comments: uses_hash_comments(file),
        prose: false,
    };
    let removed: Vec<&str> = change_blocks(patch)
        .iter()
        .flat_map(|b| b.removed.iter().copied())
        .filter(|l| !l.trim().is_empty())
        .collect();

    if removed.is_empty() || !is_top_level_declarations(&removed, syntax) {
        return FileJudgement::Disqualified(format!(
            "deletes {path}, which has top-level statements"
        ));
    }
    FileJudgement::Fits(vec![Contribution::borderline(
        Category::RemoveUnusedCode,
        removed.len(),
        format!("ambiguous dead-code removal: deletes {path}"),
    )])
}

/// Keywords that open a declaration at column zero.
const DECLARATION_KEYWORDS: &[&str] = &[
    "function", "async", "export", "def", "class", "fn", "pub", "const", "let", "var", "static",
    "interface", "type", "enum", "struct", "impl", "trait", "func", "private", "protected",
    "public", "abstract", "final", "mod",
];

fn starts_declaration(line: &str) -> bool {
    let first = line.split(|c: char| !is_word_char(c)).next().unwrap_or("");
    DECLARATION_KEYWORDS.contains(&first)
        || line.starts_with('@')
        || line.starts_with("#[")
        || is_import_line(line)
}

fn is_comment_like(line: &str, syntax: Syntax) -> bool {
    let t = line.trim_start();
    t.starts_with("//")
        || t.starts_with("/*")
        || t.starts_with('*')
        || (syntax.hash_comments && t.starts_with('#') && !t.starts_with("#["))
}

/// Removed lines that form complete declarations at the top level of the
/// file: each column-zero line opens a declaration, brackets balance, and
/// nothing indented appears outside a declaration's body.
///
/// A deletion inside a surviving body (a guard clause, a call) starts
/// indented, or leaves brackets unbalanced, and fails.
fn is_top_level_declarations(lines: &[&str], syntax: Syntax) -> bool {
    let mut depth: i64 = 0;
    let mut indented_body = false;
    let mut declarations = 0;

    for line in lines.iter().filter(|l| !l.trim().is_empty()) {
        if is_comment_like(line, syntax) {
            continue;
        }
        let indented = line.starts_with([' ', '\t']);
        if depth == 0 {
            if indented {
                // Python-style bodies hang off a `def ...:` header
                if !indented_body {
                    return false;
                }
            } else {
                if !starts_declaration(line) {
                    return false;
                }
                declarations += 1;
                indented_body = line.trim_end().ends_with(':');
            }
        }

        let chars: Vec<char> = line.chars().collect();
        for span in scan_spans(&chars, syntax) {
            if span.kind != SpanKind::Code {
                continue;
            }
            for c in &chars[span.start..span.end] {
                match c {
                    '{' | '(' | '[' => depth += 1,
                    '}' | ')' | ']' => depth -= 1,
                    _ => {}
                }
            }
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0 && declarations > 0
}

fn is_comment_line(line: &str, syntax: Syntax) -> bool {
    let chars: Vec<char> = line.chars().collect();
    scan_spans(&chars, syntax).iter().all(|s| {
        s.kind == SpanKind::Comment || chars[s.start..s.end].iter().all(|c| c.is_whitespace())
    })
}

fn judge_source_line(old: &str, new: &str, syntax: Syntax, semis: bool) -> LineVerdict {
    let o: Vec<char> = old.chars().collect();
    let n: Vec<char> = new.chars().collect();
    let Some(region) = diff_region(&o, &n) else {
        return LineVerdict::Same;
    };
    if normalize_for_format(&[old], syntax, semis) == normalize_for_format(&[new], syntax, semis) {
        return LineVerdict::Fits(Category::CodeFormatting, None);
    }

    let old_spans = scan_spans(&o, syntax);
    let new_spans = scan_spans(&n, syntax);
    let old_span = span_containing(&old_spans, region.old_start, region.old_end);
    let new_span = span_containing(&new_spans, region.new_start, region.new_end);

    match (old_span, new_span) {
        (Some(a), Some(b)) if a.kind == b.kind => match a.kind {
            SpanKind::Comment if is_typo_region(&o, &n, region) => {
                LineVerdict::Fits(Category::FixTypos, None)
            }
            SpanKind::Comment => LineVerdict::Unplaceable("rewrites a comment".to_string()),
            SpanKind::String => judge_string_edit(&o, &n, a, b, region),
            SpanKind::Code => judge_code_edit(&o, &n, region),
        },
        _ => LineVerdict::Disqualified("changes logic".to_string()),
    }
}

/// Call and attribute prefixes whose string argument is a translation key.
const TRANSLATION_CALLS: &[&str] = &["t(", "gettext(", "_(", "translate(", "i18nKey=", "i18nKey={", "id:"];

/// Attribute and helper prefixes whose string argument is a class list or
/// inline style.
const STYLE_ATTRIBUTES: &[&str] = &[
    "className=",
    "className={",
    "class=",
    "style=",
    "clsx(",
    "classNames(",
    "cn(",
];

/// `code` ends with `marker`, and the marker is not the tail of a longer
/// identifier (`split(` does not end with the `t(` call).
fn ends_with_marker(code: &str, marker: &str) -> bool {
    let Some(head) = code.strip_suffix(marker) else {
        return false;
    };
    let starts_word = marker.chars().next().is_some_and(is_word_char);
    !starts_word || !head.chars().last().is_some_and(is_word_char)
}

fn judge_string_edit(o: &[char], n: &[char], old: Span, new: Span, region: Region) -> LineVerdict {
    let before: String = o[..old.start.saturating_sub(1)].iter().collect();
    let before = before.trim_end();
    let old_text: String = o[old.start..old.end].iter().collect();
    let new_text: String = n[new.start..new.end].iter().collect();

    if TRANSLATION_CALLS.iter().any(|m| ends_with_marker(before, m)) {
        return LineVerdict::Fits(Category::UpdateI18nKey, None);
    }

    if STYLE_ATTRIBUTES.iter().any(|m| ends_with_marker(before, m)) {
        let line: String = n.iter().collect();
        if line.contains('?') || line.contains("&&") {
            return LineVerdict::Disqualified("toggles classes conditionally".to_string());
        }
        return LineVerdict::Fits(Category::UpdateUiStyle, None);
    }

    let after: String = n[(new.end + 1).min(n.len())..].iter().collect();
    if is_comparison_context(before, after.trim_start()) {
        return LineVerdict::Disqualified(
            "changes a literal used in a comparison or lookup".to_string(),
        );
    }

    if let Some(verdict) = judge_style_declaration(o, n, region) {
        return verdict;
    }

    if is_sensitive_literal(&old_text) || is_sensitive_literal(&new_text) {
        return LineVerdict::Disqualified("changes a path, URL or key literal".to_string());
    }
    // single-token literals are identifiers in disguise: roles, event names, enum values
    if is_typo_region(o, n, region) && is_prose(&old_text) && is_prose(&new_text) {
        return LineVerdict::Fits(Category::FixTypos, None);
    }
    LineVerdict::Disqualified("changes a string literal".to_string())
}

/// Code before a literal that makes it an operand of a comparison, a
/// dispatch or a lookup.
const COMPARISON_PREFIXES: &[&str] = &[
    "===", "!==", "==", "!=", "case", "[", ".includes(", ".get(", ".has(", ".indexOf(",
    ".startsWith(", ".endsWith(", ".equals(", ".match(", ".test(",
];

/// Code after a literal that compares it (`"admin" === role`).
const COMPARISON_SUFFIXES: &[&str] = &["===", "!==", "==", "!="];

fn is_comparison_context(before: &str, after: &str) -> bool {
    COMPARISON_PREFIXES.iter().any(|m| ends_with_marker(before, m))
        || COMPARISON_SUFFIXES.iter().any(|m| after.starts_with(m))
}

fn is_prose(text: &str) -> bool {
    text.trim().contains(' ') && text.chars().any(char::is_alphabetic)
}

/// Endpoint paths, URLs, patterns and environment-style keys.
fn is_sensitive_literal(text: &str) -> bool {
    let text = text.trim();
    text.contains("://")
        || text.starts_with('/')
        || text.starts_with("./")
        || text.starts_with('^')
        || (text.ends_with('$') && text.len() > 1)
        || (!text.contains(' ') && text.contains('/'))
        || (text.contains('_')
            && text
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'))
}

/// CSS-in-JS declarations (`paddingTop: 8,`, `color: "red"`), judged only
/// when the edit is confined to the value.
fn judge_style_declaration(o: &[char], n: &[char], region: Region) -> Option<LineVerdict> {
    let (old_name, old_value_at) = declaration_parts(o)?;
    let (new_name, new_value_at) = declaration_parts(n)?;
    if old_name != new_name || region.old_start < old_value_at || region.new_start < new_value_at {
        return None;
    }
    let property = kebab_case(&old_name);
    let value: String = n[new_value_at..].iter().collect();
    match classify_style_property(&property, &value) {
        StyleEdit::Plain => Some(LineVerdict::Fits(Category::UpdateUiStyle, None)),
        StyleEdit::Motion => Some(LineVerdict::Fits(
            Category::UpdateUiStyle,
            Some(format!("changes `{property}` animation")),
        )),
        StyleEdit::Behavioral => Some(LineVerdict::Disqualified(format!(
            "changes `{property}`, which alters rendering or interaction"
        ))),
        StyleEdit::Unknown => None,
    }
}

fn judge_code_edit(o: &[char], n: &[char], region: Region) -> LineVerdict {
    if let Some(verdict) = judge_style_declaration(o, n, region) {
        return verdict;
    }

    let (os, oe) = expand_to_words(o, region.old_start, region.old_end);
    let (ns, ne) = expand_to_words(n, region.new_start, region.new_end);
    let old_word = &o[os..oe];
    let new_word = &n[ns..ne];
    let single_word = |w: &[char]| !w.is_empty() && w.iter().all(|c| is_word_char(*c));

    if single_word(old_word) && single_word(new_word) {
        let old_word: String = old_word.iter().collect();
        let new_word: String = new_word.iter().collect();
        if is_identifier_typo(&old_word, &new_word) {
            return LineVerdict::Fits(
                Category::FixTypos,
                Some(format!("renames identifier `{old_word}` to `{new_word}`")),
            );
        }
    }
    LineVerdict::Disqualified("changes logic".to_string())
}

// ---------------------------------------------------------------------------
// Documentation
// ---------------------------------------------------------------------------

fn judge_docs(file: &FileChange, patch: &str) -> FileJudgement {
    let syntax = Syntax {
        hash_comments: false,
        prose: true,
    };
    let path = file.path.as_str();
    let mut tally = FileTally::default();

    for block in change_blocks(patch) {
        let removed = non_blank(&block.removed);
        let added = non_blank(&block.added);
        if removed.is_empty() && added.is_empty() {
            tally.fit(Category::FixTypos, block.line_count());
            continue;
        }
        if removed.len() != added.len() {
            tally.unplace(format!("rewrites documentation in {path}"));
            continue;
        }
        for (old, new) in removed.iter().zip(&added) {
            let o: Vec<char> = old.chars().collect();
            let n: Vec<char> = new.chars().collect();
            let Some(region) = diff_region(&o, &n) else {
                continue;
            };
            if (old.contains("://") || old.contains("](")) && !is_typo_region(&o, &n, region) {
                tally.unplace(format!("edits a link in {path}"));
            } else if normalize_for_format(&[old], syntax, false)
                == normalize_for_format(&[new], syntax, false)
                || is_typo_region(&o, &n, region)
            {
                tally.fit(Category::FixTypos, 1);
            } else {
                tally.unplace(format!("rewrites documentation in {path}"));
            }
        }
    }
    tally.finish()
}

// ---------------------------------------------------------------------------
// Translation resources
// ---------------------------------------------------------------------------

/// Key fragments that feed routing rather than display text.
const ROUTING_KEY_PARTS: &[&str] = &["route", "path", "url", "href", "slug"];

/// The key a translation line defines, if any. Structural lines (braces,
/// comments, blanks) define none.
fn locale_key(line: &str) -> Option<String> {
    let t = line.trim();
    if t.is_empty() || t.starts_with('#') || t.starts_with("//") {
        return None;
    }
    if let Some(rest) = t.strip_prefix("msgid ") {
        return Some(format!("msgid {}", rest.trim()));
    }
    if t.starts_with("msgstr") || t.starts_with("msgctxt") || (t.starts_with('"') && !t.contains(':')) {
        return None;
    }
    let sep = t.find([':', '='])?;
    let key = t[..sep].trim().trim_matches(['"', '\'']).trim();
    (!key.is_empty()).then(|| key.to_string())
}

fn is_routing_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    let last = key.rsplit(['.', '/']).next().unwrap_or(key.as_str());
    ROUTING_KEY_PARTS.iter().any(|part| last.contains(part))
}

fn judge_locale(file: &FileChange, patch: &str) -> FileJudgement {
    let path = file.path.as_str();
    let mut removed_keys = Vec::new();
    let mut added_keys = HashSet::new();
    let mut weight = 0usize;

    for block in change_blocks(patch) {
        weight += block.line_count();
        removed_keys.extend(block.removed.iter().filter_map(|l| locale_key(l)));
        added_keys.extend(block.added.iter().filter_map(|l| locale_key(l)));
    }

    let mut tally = FileTally::default();
    for key in &removed_keys {
        if !added_keys.contains(key) {
            tally.disqualify(format!(
                "removes translation key `{key}` without usage proof in {path}"
            ));
        }
    }
    if let Some(key) = removed_keys
        .iter()
        .chain(added_keys.iter())
        .find(|k| is_routing_key(k))
    {
        tally.disqualify(format!("changes routing-affecting key `{key}` in {path}"));
    }
    if weight > 0 {
        tally.fit(Category::UpdateI18nKey, weight);
    }
    tally.finish()
}

// ---------------------------------------------------------------------------
// Stylesheets
// ---------------------------------------------------------------------------

fn judge_stylesheet(file: &FileChange, patch: &str) -> FileJudgement {
    let syntax = Syntax::default();
    let path = file.path.as_str();
    let mut tally = FileTally::default();

    for block in change_blocks(patch) {
        if normalize_for_format(&block.removed, syntax, false)
            == normalize_for_format(&block.added, syntax, false)
        {
            tally.fit(Category::CodeFormatting, block.line_count());
            continue;
        }

        let removed: HashSet<&str> = block.removed.iter().map(|l| l.trim()).collect();
        let added: HashSet<&str> = block.added.iter().map(|l| l.trim()).collect();
        let changed = block
            .removed
            .iter()
            .map(|l| l.trim())
            .filter(|l| !added.contains(l))
            .chain(
                block
                    .added
                    .iter()
                    .map(|l| l.trim())
                    .filter(|l| !removed.contains(l)),
            );

        let mut flag = None;
        for line in changed {
            match judge_style_line(line) {
                StyleLine::Neutral => {}
                StyleLine::Borderline(reason) => {
                    flag.get_or_insert_with(|| format!("{reason} in {path}"));
                }
                StyleLine::Disqualified(reason) => tally.disqualify(format!("{reason} in {path}")),
                StyleLine::Unknown => {
                    tally.unplace(format!("unrecognized stylesheet change in {path}"))
                }
            }
        }
        match flag {
            Some(flag) => tally.fit_borderline(Category::UpdateUiStyle, block.line_count(), flag),
            None => tally.fit(Category::UpdateUiStyle, block.line_count()),
        }
    }
    tally.finish()
}

enum StyleLine {
    Neutral,
    Borderline(&'static str),
    Disqualified(String),
    Unknown,
}

fn judge_style_line(line: &str) -> StyleLine {
    if line.is_empty() || line.starts_with("/*") || line.starts_with('*') || line.starts_with("//") {
        return StyleLine::Neutral;
    }
    if [":hover", ":focus", ":active"].iter().any(|s| line.contains(s)) {
        return StyleLine::Borderline("changes interaction-state styles");
    }
    if line.starts_with('@') {
        return StyleLine::Borderline("changes at-rules");
    }
    if line.ends_with('{') || line.ends_with(',') || line.starts_with('}') {
        return StyleLine::Borderline("changes selectors");
    }

    let chars: Vec<char> = line.chars().collect();
    let Some((property, value_at)) = declaration_parts(&chars) else {
        return StyleLine::Unknown;
    };
    let value: String = chars[value_at..].iter().collect();
    match classify_style_property(&property, &value) {
        StyleEdit::Behavioral => StyleLine::Disqualified(format!(
            "changes `{property}`, which alters rendering or interaction"
        )),
        StyleEdit::Motion => StyleLine::Borderline("changes animation or transition"),
        StyleEdit::Plain | StyleEdit::Unknown => StyleLine::Neutral,
    }
}

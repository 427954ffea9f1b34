//! Line-level text analysis for the rule engine.
//!
//! Lines are handled as `Vec<char>` so every index here is a character index.

use phf::phf_set;

/// What a run of characters in a source line is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Code,
    /// Contents of a string literal, quotes excluded.
    String,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub kind: SpanKind,
    pub start: usize,
    pub end: usize,
}

/// Comment conventions for the file being scanned.
#[derive(Debug, Clone, Copy, Default)]
pub struct Syntax {
    /// `#` starts a line comment
    pub hash_comments: bool,
    /// Every line is prose (Markdown, plain text)
    pub prose: bool,
}

/// Split a single line into code, string and comment spans.
///
/// Strings spanning lines and nested comment forms are not tracked; a line that
/// starts with `*` inside a block comment is treated as comment.
pub fn scan_spans(line: &[char], syntax: Syntax) -> Vec<Span> {
    let len = line.len();
    if syntax.prose {
        return vec![Span {
            kind: SpanKind::Comment,
            start: 0,
            end: len,
        }];
    }

    let first = line.iter().position(|c| !c.is_whitespace()).unwrap_or(len);
    if line.get(first) == Some(&'*') {
        return vec![Span {
            kind: SpanKind::Comment,
            start: 0,
            end: len,
        }];
    }

    let mut spans = Vec::new();
    let mut code_start = 0;
    let mut i = 0;
    let starts_with = |at: usize, pat: &str| {
        let pat: Vec<char> = pat.chars().collect();
        line.len() >= at + pat.len() && line[at..at + pat.len()] == pat[..]
    };

    while i < len {
        let c = line[i];
        let comment_end = if starts_with(i, "//") || (syntax.hash_comments && c == '#') {
            Some(len)
        } else if starts_with(i, "/*") {
            Some(find_from(line, i + 2, "*/").map_or(len, |j| j + 2))
        } else if starts_with(i, "<!--") {
            Some(find_from(line, i + 4, "-->").map_or(len, |j| j + 3))
        } else {
            None
        };

        if let Some(end) = comment_end {
            push_code(&mut spans, code_start, i);
            spans.push(Span {
                kind: SpanKind::Comment,
                start: i,
                end,
            });
            i = end;
            code_start = end;
            continue;
        }

        if matches!(c, '"' | '`') || (c == '\'' && opens_char_literal(line, i)) {
            let mut j = i + 1;
            while j < len && line[j] != c {
                if line[j] == '\\' {
                    j += 1;
                }
                j += 1;
            }
            let content_end = j.min(len);
            push_code(&mut spans, code_start, i + 1);
            spans.push(Span {
                kind: SpanKind::String,
                start: i + 1,
                end: content_end,
            });
            i = (content_end + 1).min(len);
            code_start = content_end;
            continue;
        }

        i += 1;
    }
    push_code(&mut spans, code_start, len);
    spans
}

/// `'` after an identifier, `&` or `<` is a lifetime or suffix, not a literal.
fn opens_char_literal(line: &[char], at: usize) -> bool {
    match at.checked_sub(1).map(|p| line[p]) {
        Some(prev) => !(is_word_char(prev) || prev == '&' || prev == '<'),
        None => true,
    }
}

fn push_code(spans: &mut Vec<Span>, start: usize, end: usize) {
    if start < end {
        spans.push(Span {
            kind: SpanKind::Code,
            start,
            end,
        });
    }
}

fn find_from(line: &[char], from: usize, pat: &str) -> Option<usize> {
    let pat: Vec<char> = pat.chars().collect();
    (from..line.len().saturating_sub(pat.len() - 1)).find(|&i| line[i..i + pat.len()] == pat[..])
}

/// The span kind that fully contains `[start, end)`. Empty ranges (pure
/// insertions) match a span that contains or ends at `start`.
pub fn kind_containing(spans: &[Span], start: usize, end: usize) -> Option<SpanKind> {
    spans
        .iter()
        .find(|s| s.start <= start && end <= s.end && (start < s.end || start == end))
        .map(|s| s.kind)
}

/// The span containing `[start, end)`, with the same rules as [`kind_containing`].
pub fn span_containing(spans: &[Span], start: usize, end: usize) -> Option<Span> {
    spans
        .iter()
        .find(|s| s.start <= start && end <= s.end && (start < s.end || start == end))
        .copied()
}

/// Where two lines differ: `[old_start, old_end)` in the old line and
/// `[new_start, new_end)` in the new one, after trimming the common prefix and
/// suffix. `None` when the lines are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub old_start: usize,
    pub old_end: usize,
    pub new_start: usize,
    pub new_end: usize,
}

pub fn diff_region(old: &[char], new: &[char]) -> Option<Region> {
    if old == new {
        return None;
    }
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();
    Some(Region {
        old_start: prefix,
        old_end: old.len() - suffix,
        new_start: prefix,
        new_end: new.len() - suffix,
    })
}

pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\''
}

/// Grow `[start, end)` outward to whole-word boundaries.
pub fn expand_to_words(line: &[char], mut start: usize, mut end: usize) -> (usize, usize) {
    while start > 0 && is_word_char(line[start - 1]) {
        start -= 1;
    }
    while end < line.len() && is_word_char(line[end]) {
        end += 1;
    }
    (start, end)
}

pub fn words(chars: &[char]) -> Vec<String> {
    chars
        .split(|c| !is_word_char(*c))
        .filter(|w| !w.is_empty())
        .map(|w| w.iter().collect::<String>().trim_matches('\'').to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Optimal string alignment distance (Levenshtein plus adjacent transposition).
pub fn osa_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    let mut d = vec![vec![0usize; m + 1]; n + 1];
    for (i, row) in d.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=m {
        d[0][j] = j;
    }
    for i in 1..=n {
        for j in 1..=m {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (d[i - 1][j] + 1)
                .min(d[i][j - 1] + 1)
                .min(d[i - 1][j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(d[i - 2][j - 2] + 1);
            }
            d[i][j] = best;
        }
    }
    d[n][m]
}

/// Short words a grammar fix may insert or drop.
static FUNCTION_WORDS: phf::Set<&'static str> = phf_set! {
    "a", "an", "the", "to", "of", "in", "on", "is", "be", "it", "and", "or", "for", "as", "at", "by",
};

/// A spelling correction: close in edit distance, not a different word.
pub fn is_typo_pair(old: &str, new: &str) -> bool {
    if old == new {
        return true;
    }
    let has_digit = |w: &str| w.chars().any(|c| c.is_ascii_digit());
    if has_digit(old) || has_digit(new) {
        return false;
    }
    let (lo, ln) = (old.to_lowercase(), new.to_lowercase());
    if lo == ln {
        return true;
    }
    let longest = lo.chars().count().max(ln.chars().count());
    let limit = longest.div_ceil(3).clamp(1, 2);
    osa_distance(&lo, &ln) <= limit
}

/// Whether replacing `old` words with `new` words reads as a typo or grammar
/// fix rather than a rewrite.
pub fn is_typo_edit(old: &[String], new: &[String]) -> bool {
    if old == new || old.len() > 4 || new.len() > 4 {
        return false;
    }
    if old.len() == new.len() {
        return old.iter().zip(new).all(|(a, b)| is_typo_pair(a, b));
    }

    let (longer, shorter) = if old.len() > new.len() {
        (old, new)
    } else {
        (new, old)
    };
    if longer.len() != shorter.len() + 1 {
        return false;
    }
    (0..longer.len()).any(|skip| {
        FUNCTION_WORDS.contains(longer[skip].to_lowercase().as_str())
            && longer
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, w)| w)
                .zip(shorter)
                .all(|(a, b)| is_typo_pair(a, b))
    })
}

/// Whether an edit confined to `[region]` of a comment or string is a typo
/// fix. Punctuation-only edits of up to two characters also count.
pub fn is_typo_region(old: &[char], new: &[char], region: Region) -> bool {
    let (os, oe) = expand_to_words(old, region.old_start, region.old_end);
    let (ns, ne) = expand_to_words(new, region.new_start, region.new_end);
    let old_words = words(&old[os..oe]);
    let new_words = words(&new[ns..ne]);

    if old_words == new_words {
        let changed = (region.old_end - region.old_start).max(region.new_end - region.new_start);
        return changed <= 2;
    }
    is_typo_edit(&old_words, &new_words)
}

/// Canonical text for formatting comparison: whitespace outside string
/// literals removed, quotes unified, trailing commas dropped, and (for JS-family
/// files) statement semicolons dropped.
pub fn normalize_for_format(lines: &[&str], syntax: Syntax, optional_semicolons: bool) -> String {
    let mut out = String::new();
    for line in lines {
        let chars: Vec<char> = line.chars().collect();
        for span in scan_spans(&chars, syntax) {
            let text = &chars[span.start..span.end];
            match span.kind {
                SpanKind::String => out.extend(text.iter()),
                SpanKind::Code | SpanKind::Comment => out.extend(
                    text.iter()
                        .filter(|c| !c.is_whitespace())
                        .map(|&c| if matches!(c, '\'' | '`') { '"' } else { c }),
                ),
            }
        }
        if optional_semicolons {
            while out.ends_with(';') {
                out.pop();
            }
        }
        out.push('\n');
    }

    // trailing commas before a closer (possibly on a following line)
    let chars: Vec<char> = out.chars().collect();
    let mut result = String::with_capacity(out.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == ',' {
            let next = chars[i + 1..].iter().find(|c| **c != '\n');
            if matches!(next, None | Some(')' | ']' | '}' | '>')) {
                continue;
            }
        }
        if c != '\n' {
            result.push(c);
        }
    }
    result
}

/// Formatting-only statement starts that may be freely reordered.
pub fn is_import_line(line: &str) -> bool {
    let t = line.trim_start();
    t.starts_with("import ")
        || t.starts_with("use ")
        || t.starts_with("pub use ")
        || (t.starts_with("from ") && t.contains(" import "))
        || t.starts_with("#include")
        || t.starts_with("require ")
        || t.starts_with("export * from")
        || (t.starts_with("export {") && t.contains(" from "))
        || (t.starts_with("const ") || t.starts_with("var ") || t.starts_with("let "))
            && t.contains("require(")
}

/// Common CSS properties (kebab-case) accepted as style edits in source files.
pub static CSS_PROPERTIES: phf::Set<&'static str> = phf_set! {
    "color", "background", "background-color", "background-image", "opacity",
    "padding", "padding-top", "padding-right", "padding-bottom", "padding-left",
    "padding-inline", "padding-block", "margin", "margin-top", "margin-right",
    "margin-bottom", "margin-left", "margin-inline", "margin-block", "gap",
    "row-gap", "column-gap", "border", "border-color", "border-width", "border-style",
    "border-radius", "border-top", "border-bottom", "border-left", "border-right",
    "box-shadow", "text-shadow", "font", "font-size", "font-weight", "font-family",
    "font-style", "line-height", "letter-spacing", "text-align", "text-decoration",
    "text-transform", "width", "height", "min-width", "min-height", "max-width",
    "max-height", "flex", "flex-grow", "flex-shrink", "flex-basis", "align-items",
    "justify-content", "align-self", "justify-items", "z-index", "cursor", "fill",
    "stroke", "stroke-width", "outline", "outline-color", "outline-width", "outline-offset", "filter", "backdrop-filter",
    "grid-template-columns", "grid-template-rows", "top", "right", "bottom", "left",
    "inset", "transform", "white-space", "word-break", "overflow-wrap",
};

/// Properties whose edits change what is rendered or interactive.
pub static BEHAVIORAL_CSS_PROPERTIES: phf::Set<&'static str> = phf_set! {
    "display", "visibility", "pointer-events", "content", "user-select",
    "position", "overflow", "clip", "clip-path",
};

/// How risky a style declaration edit is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleEdit {
    /// Purely visual: colors, spacing, typography, theme tokens
    Plain,
    /// Animation or transition timing
    Motion,
    /// Hides, disables or repositions content, or removes focus indication
    Behavioral,
    /// Not a known style property
    Unknown,
}

pub fn classify_style_property(property: &str, value: &str) -> StyleEdit {
    let property = property.to_ascii_lowercase();
    let value = value
        .trim()
        .trim_end_matches([';', ','])
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_ascii_lowercase();

    if BEHAVIORAL_CSS_PROPERTIES.contains(property.as_str()) {
        return StyleEdit::Behavioral;
    }
    if property.starts_with("outline") && (value.contains("none") || value == "0") {
        return StyleEdit::Behavioral;
    }
    if property.contains("animation") || property.contains("transition") {
        return StyleEdit::Motion;
    }
    if CSS_PROPERTIES.contains(property.as_str())
        || property.starts_with("--")
        || property.starts_with('$')
    {
        return StyleEdit::Plain;
    }
    StyleEdit::Unknown
}

/// A misspelled identifier corrected by swapping two adjacent letters
/// (`lenght` → `length`) or by doubling/undoubling a letter (`adress` →
/// `address`). Substitutions are never accepted: `getUser` → `setUser` is a
/// different identifier.
pub fn is_identifier_typo(old: &str, new: &str) -> bool {
    let a: Vec<char> = old.chars().collect();
    let b: Vec<char> = new.chars().collect();
    if a.len().min(b.len()) < 4 || a == b {
        return false;
    }

    if a.len() == b.len() {
        let diffs: Vec<usize> = (0..a.len()).filter(|&i| a[i] != b[i]).collect();
        return diffs.len() == 2
            && diffs[1] == diffs[0] + 1
            && a[diffs[0]] == b[diffs[1]]
            && a[diffs[1]] == b[diffs[0]];
    }

    let (long, short) = if a.len() > b.len() { (&a, &b) } else { (&b, &a) };
    if long.len() != short.len() + 1 {
        return false;
    }
    let at = long
        .iter()
        .zip(short.iter())
        .position(|(x, y)| x != y)
        .unwrap_or(short.len());
    let extra = long[at];
    let doubled = (at > 0 && long[at - 1] == extra) || long.get(at + 1) == Some(&extra);
    doubled && long[..at] == short[..at] && long[at + 1..] == short[at..]
}

/// Kebab-case a camelCase CSS-in-JS key (`paddingTop` → `padding-top`).
pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Split `name: value` at the first colon, returning the bare property name
/// and the character index where the value starts.
pub fn declaration_parts(line: &[char]) -> Option<(String, usize)> {
    let colon = line.iter().position(|c| *c == ':')?;
    let name: String = line[..colon]
        .iter()
        .collect::<String>()
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '$'))
    {
        return None;
    }
    Some((name, colon + 1))
}

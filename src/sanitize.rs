//! Deterministic post-processing of model output.
//!
//! Local models pad answers with hedging and editor meta-commentary
//! ("no changes needed", proofreader preambles). These are stripped with a
//! fixed pattern table before anything reaches the caller, and rule text is
//! normalized by removing duplicate adjacent sentences.

use std::sync::LazyLock;

use regex::Regex;

/// Hedging and meta-commentary phrases to remove outright.
static HEDGING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\(?\s*no\s+changes\s+needed[^)]*\)?\.?",
        r"(?i)\balready\s+grammatically\s+correct(?:\s+and)?\s+concise\b",
        r"(?i)\bno\s+edits\s+required\b",
        r"(?i)\btext\s+is\s+already\s+clear\s+and\s+concise\b",
        r"(?i)\(i['’]?(?:ve| have)\s+(?:just\s+)?(?:added|made|fixed|corrected|updated)[^)]+?\)",
        r"(?i)\(edited\s+for\s+clarity[^)]*\)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Whole lines of editor/proofreader commentary.
static META_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*(?:note|editor|proofreader)[ \t]*:[ \t].*$").expect("valid regex"));

static TRAILING_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+\n").expect("valid regex"));

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

static PARENTHETICAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("valid regex"));

static WHITESPACE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip hedging phrases and editor meta-commentary from model output.
///
/// If stripping removes everything, falls back to the original text with
/// parenthetical asides removed instead — a non-empty input with any
/// non-parenthetical content never collapses to an empty string.
/// Idempotent: a second pass finds nothing left to remove.
pub fn sanitize_ai(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut out = text.to_string();
    for re in HEDGING_PATTERNS.iter() {
        out = re.replace_all(&out, "").into_owned();
    }
    out = META_LINE_RE.replace_all(&out, "").into_owned();
    out = TRAILING_SPACE_RE.replace_all(&out, "\n").into_owned();
    out = BLANK_RUN_RE.replace_all(&out, "\n\n").into_owned();

    let trimmed = out.trim();
    if trimmed.is_empty() {
        PARENTHETICAL_RE.replace_all(text, "").trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Normalize payer rule text: collapse whitespace and drop duplicate
/// adjacent sentences (case-insensitive). Empty input yields empty output.
///
/// Sentence boundaries are a terminator (`.`, `!`, `?`) followed by
/// whitespace; sentences are rejoined with single spaces.
pub fn normalize_rule_text(text: &str) -> String {
    let collapsed = WHITESPACE_RUN_RE.replace_all(text.trim(), " ");
    if collapsed.is_empty() {
        return String::new();
    }

    let mut sentences: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut chars = collapsed.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek() == Some(&' ') {
            chars.next(); // separator space
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }

    let mut deduped: Vec<String> = Vec::new();
    for sentence in sentences {
        let is_repeat = deduped
            .last()
            .is_some_and(|prev| prev.to_lowercase() == sentence.to_lowercase());
        if !is_repeat {
            deduped.push(sentence);
        }
    }
    deduped.join(" ")
}

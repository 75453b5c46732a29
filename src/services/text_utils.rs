//! Shared text normalization and comparison utilities
//!
//! Consolidates the string processing used by the filename parser, the
//! confidence scorer and the grouping matchers so each compares titles the
//! same way.

use once_cell::sync::Lazy;
use regex::Regex;

static BRACKETED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]|\{[^}]*\}").unwrap());
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalize a title for fuzzy matching.
/// Replaces separators with spaces, collapses whitespace, lowercases.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .replace(['.', '-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a title with article removal for more aggressive matching.
/// Removes leading articles ("the", "a", "an") before separator cleanup.
pub fn normalize_title_no_articles(title: &str) -> String {
    let mut normalized = title.to_lowercase();

    let articles = ["the ", "a ", "an "];
    for article in articles {
        if normalized.starts_with(article) {
            normalized = normalized[article.len()..].to_string();
        }
    }

    normalized
        .replace(['.', '-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip bracketed content (release tags, version info) from a title.
pub fn strip_bracketed(title: &str) -> String {
    let stripped = BRACKETED_RE.replace_all(title, " ");
    SPACE_RE.replace_all(stripped.trim(), " ").to_string()
}

/// Normalize curly apostrophes and quotes to their ASCII forms.
pub fn normalize_punctuation(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
}

/// Case-insensitive fuzzy similarity ratio between two strings (0..100).
pub fn fuzzy_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    rapidfuzz::fuzz::ratio(a.chars(), b.chars())
}

/// Calculate similarity between two strings (0.0 to 1.0).
/// Uses rapidfuzz normalized Levenshtein similarity.
pub fn string_similarity(s1: &str, s2: &str) -> f64 {
    use rapidfuzz::distance::levenshtein;

    if s1.is_empty() && s2.is_empty() {
        return 1.0;
    }

    levenshtein::normalized_similarity(s1.chars(), s2.chars())
}

/// Word-order-invariant similarity: tokens are sorted before comparison so
/// "Fire Chicago" still matches "Chicago Fire".
fn token_sort_similarity(s1: &str, s2: &str) -> f64 {
    let mut t1: Vec<&str> = s1.split_whitespace().collect();
    let mut t2: Vec<&str> = s2.split_whitespace().collect();
    t1.sort_unstable();
    t2.sort_unstable();
    string_similarity(&t1.join(" "), &t2.join(" "))
}

/// Calculate similarity between two titles (0.0 to 1.0).
/// Normalizes both, then combines:
/// - normalized Levenshtein similarity
/// - token sort similarity (word order invariant)
/// and takes the best of the two.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let n1 = normalize_title(a);
    let n2 = normalize_title(b);

    if n1 == n2 {
        return 1.0;
    }
    if n1.is_empty() || n2.is_empty() {
        return 0.0;
    }

    string_similarity(&n1, &n2).max(token_sort_similarity(&n1, &n2))
}

/// True when either string contains the other after normalization.
/// Used by the partial-match fallback for abbreviation-style queries.
pub fn contains_either_way(a: &str, b: &str) -> bool {
    let n1 = normalize_title(a);
    let n2 = normalize_title(b);
    if n1.is_empty() || n2.is_empty() {
        return false;
    }
    n1.contains(&n2) || n2.contains(&n1)
}

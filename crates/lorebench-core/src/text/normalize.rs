//! Answer normalization.
//!
//! Two variants with different contracts:
//!
//! - [`normalize_answer`] is the heavy form used for answer-level comparison
//!   (exact match, token F1, answer-in-context): lowercase, strip Unicode
//!   punctuation, strip English articles, collapse whitespace.
//! - [`strip_token`] is the light form used inside span matching: it cleans a
//!   single token without touching the caller's token boundaries.

use once_cell::sync::Lazy;
use regex::Regex;

static PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{P}").expect("punctuation class"));
static ARTICLES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(a|an|the)\b").expect("article list"));

/// Normalizes an answer string for comparison.
///
/// Lowercases, removes all Unicode punctuation, removes the English articles
/// `a`/`an`/`the`, and collapses runs of whitespace to single spaces.
///
/// ```
/// use lorebench_core::text::normalize_answer;
/// assert_eq!(normalize_answer("The Nile, in Egypt."), "nile in egypt");
/// ```
pub fn normalize_answer(text: &str) -> String {
    let lowered = text.to_lowercase();
    let no_punct = PUNCT.replace_all(&lowered, "");
    let no_articles = ARTICLES.replace_all(&no_punct, " ");
    no_articles.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleans a single token for span matching.
///
/// Drops characters whose UTF-8 encoding exceeds 3 bytes (emoji and other
/// supplementary-plane symbols that tokenizers segment inconsistently),
/// lowercases, and strips punctuation. May return an empty string; callers
/// drop empty tokens.
pub fn strip_token(token: &str) -> String {
    let kept: String = token.chars().filter(|c| c.len_utf8() <= 3).collect();
    let lowered = kept.to_lowercase();
    PUNCT.replace_all(&lowered, "").into_owned()
}

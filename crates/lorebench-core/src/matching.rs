//! Fuzzy answer-span matching inside knowledge-source pages.
//!
//! [`match_answer`] locates the best span for a gold answer string inside a
//! page's paragraphs. Exhaustively BLEU-scoring every contiguous token span
//! of every paragraph is too expensive over a whole page, so matching runs
//! as a coarse-filter/fine-rank pipeline:
//!
//! 1. substring fast path over raw paragraph text (first hit wins, score 1.0)
//! 2. token-set intersection against the answer ranks paragraphs
//! 3. paragraphs whose intersection covers the whole answer get an exact
//!    contiguous-sequence probe before any fuzzy work
//! 4. the top few paragraphs by intersection (full tie groups kept) go to the
//!    fuzzy scan: every contiguous token span is BLEU-scored against the
//!    answer, ties broken toward shorter spans, perfect scores end the scan
//!
//! Failure (unable to tokenize the answer, or nothing left after exclusions)
//! is reported as `None` and is recoverable: the caller records "no evidence
//! found" and moves on.

use crate::config::DEFAULT_PARAGRAPH_CANDIDATES;
use crate::record::Document;
use crate::text::normalize::strip_token;
use crate::text::tokenize::{SpanToken, SpanTokenizer};
use crate::text::bleu::bleu;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// A located answer span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanMatch {
    /// Index of the paragraph containing the span.
    pub paragraph: usize,
    /// Character offset of the span start, when the tokenizer provides
    /// offsets.
    pub start_character: Option<usize>,
    /// Character offset one past the span end.
    pub end_character: Option<usize>,
    /// Match confidence in `[0, 1]`; 1.0 is an exact match.
    pub score: f64,
}

/// Configuration for [`match_answer`].
pub struct MatchConfig<'a> {
    /// Offset-aware tokenizer. When absent, paragraphs are whitespace-split
    /// without offset annotations and fuzzy matches report their offsets as
    /// unavailable.
    pub tokenizer: Option<&'a dyn SpanTokenizer>,
    /// Minimum number of paragraphs surviving the intersection pre-filter.
    pub max_paragraph_candidates: usize,
    /// Case-insensitive fast path and token stripping.
    pub normalize: bool,
    /// Skip the fuzzy BLEU fallback entirely.
    pub fast: bool,
    /// Paragraph indices to ignore, e.g. ones already consumed by earlier
    /// matches against the same page.
    pub exclude: Option<&'a HashSet<usize>>,
}

impl Default for MatchConfig<'_> {
    fn default() -> Self {
        Self {
            tokenizer: None,
            max_paragraph_candidates: DEFAULT_PARAGRAPH_CANDIDATES,
            normalize: true,
            fast: false,
            exclude: None,
        }
    }
}

impl MatchConfig<'_> {
    fn excluded(&self, idx: usize) -> bool {
        self.exclude.map_or(false, |set| set.contains(&idx))
    }
}

/// One paragraph token after cleaning, with its source offsets.
struct CleanToken {
    text: String,
    offsets: Option<(usize, usize)>,
}

/// Locates the best span for `answer` inside `document`.
///
/// Returns `None` when the answer cannot be tokenized or no candidate
/// paragraph survives the exclusion set. Otherwise the returned span carries
/// a score of 1.0 for exact (substring or token-sequence) matches and the
/// best BLEU score found for fuzzy ones.
pub fn match_answer(answer: &str, document: &Document, config: &MatchConfig) -> Option<SpanMatch> {
    let answer = answer.trim();
    if answer.is_empty() {
        return None;
    }

    // 1. Substring fast path, in paragraph order. Checks the raw answer and,
    // when normalizing, a case-insensitive variant.
    let answer_chars: Vec<char> = answer.chars().collect();
    for (idx, paragraph) in document.paragraphs.iter().enumerate() {
        if config.excluded(idx) {
            continue;
        }
        let paragraph_chars: Vec<char> = paragraph.chars().collect();
        let hit = find_chars(&paragraph_chars, &answer_chars, false).or_else(|| {
            if config.normalize {
                find_chars(&paragraph_chars, &answer_chars, true)
            } else {
                None
            }
        });
        if let Some(start) = hit {
            return Some(SpanMatch {
                paragraph: idx,
                start_character: Some(start),
                end_character: Some(start + answer_chars.len()),
                score: 1.0,
            });
        }
    }

    // 2. Tokenize the answer and every paragraph. An answer that cannot be
    // tokenized (or reduces to nothing after cleaning) cannot be matched.
    let answer_tokens = clean_tokens(tokenize(answer, config)?, config.normalize);
    if answer_tokens.is_empty() {
        return None;
    }
    let answer_texts: Vec<&str> = answer_tokens.iter().map(|t| t.text.as_str()).collect();
    let answer_set: HashSet<&str> = answer_texts.iter().copied().collect();

    let mut paragraph_tokens: Vec<Vec<CleanToken>> = Vec::with_capacity(document.paragraphs.len());
    for paragraph in &document.paragraphs {
        let tokens = match tokenize(paragraph, config) {
            Some(tokens) => clean_tokens(tokens, config.normalize),
            None => Vec::new(),
        };
        paragraph_tokens.push(tokens);
    }

    let intersection_size = |tokens: &[CleanToken]| {
        let set: HashSet<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        set.intersection(&answer_set).count()
    };

    // 3. Exact-sequence short-circuit: a paragraph containing every answer
    // token may hold the answer verbatim; probing it first avoids the fuzzy
    // scan entirely.
    for (idx, tokens) in paragraph_tokens.iter().enumerate() {
        if config.excluded(idx) {
            continue;
        }
        if intersection_size(tokens) == answer_set.len() {
            if let Some(found) = find_token_sequence(tokens, &answer_texts) {
                return Some(span_match(idx, found, 1.0));
            }
        }
    }

    // 4. Candidate selection: paragraphs grouped by intersection size,
    // descending; groups are taken whole until the cap is reached.
    let mut by_size: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, tokens) in paragraph_tokens.iter().enumerate() {
        if config.excluded(idx) {
            continue;
        }
        let size = intersection_size(tokens);
        if size > 0 {
            by_size.entry(size).or_default().push(idx);
        }
    }

    let mut candidates: Vec<usize> = Vec::new();
    for (_, group) in by_size.iter().rev() {
        if candidates.len() >= config.max_paragraph_candidates {
            break;
        }
        candidates.extend_from_slice(group);
    }
    if candidates.is_empty() {
        debug!("no candidate paragraph shares tokens with the answer");
        return None;
    }

    // 5. Exact contiguous sequence anywhere in the candidates beats any
    // fuzzy score; scan in selection order and stop on the first.
    for &idx in &candidates {
        if let Some(found) = find_token_sequence(&paragraph_tokens[idx], &answer_texts) {
            return Some(span_match(idx, found, 1.0));
        }
    }

    if config.fast {
        return None;
    }

    // 6. Fuzzy scan: BLEU-score every contiguous span of every candidate,
    // preferring higher scores and, at equal score, shorter spans. A perfect
    // score ends the scan immediately.
    let mut best: Option<(f64, usize, usize, &[CleanToken])> = None; // score, len, paragraph, span
    'candidates: for &idx in &candidates {
        let tokens = &paragraph_tokens[idx];
        for start in 0..tokens.len() {
            for end in (start + 1)..=tokens.len() {
                let span = &tokens[start..end];
                let span_texts: Vec<&str> = span.iter().map(|t| t.text.as_str()).collect();
                let score = bleu(&span_texts, &answer_texts);
                let better = match &best {
                    None => true,
                    Some((best_score, best_len, _, _)) => {
                        score > *best_score || (score == *best_score && span.len() < *best_len)
                    }
                };
                if better {
                    best = Some((score, span.len(), idx, span));
                }
                if score >= 1.0 {
                    break 'candidates;
                }
            }
        }
    }

    best.map(|(score, _, idx, span)| span_match(idx, span, score))
}

/// Builds a [`SpanMatch`] from a chosen token span, propagating offsets only
/// when both ends carry annotations.
fn span_match(paragraph: usize, span: &[CleanToken], score: f64) -> SpanMatch {
    let start_character = span.first().and_then(|t| t.offsets).map(|(s, _)| s);
    let end_character = span.last().and_then(|t| t.offsets).map(|(_, e)| e);
    SpanMatch {
        paragraph,
        start_character,
        end_character,
        score,
    }
}

/// Tokenizes with the configured capability, or whitespace-splits without
/// offsets as the approximate fallback. `None` signals a tokenizer failure.
fn tokenize(text: &str, config: &MatchConfig) -> Option<Vec<SpanToken>> {
    match config.tokenizer {
        Some(tokenizer) => tokenizer.span_tokens(text).ok(),
        None => Some(
            text.split_whitespace()
                .map(|t| SpanToken {
                    text: t.to_string(),
                    offsets: None,
                })
                .collect(),
        ),
    }
}

/// Cleans tokens and drops the ones that vanish.
fn clean_tokens(tokens: Vec<SpanToken>, normalize: bool) -> Vec<CleanToken> {
    tokens
        .into_iter()
        .filter_map(|token| {
            let text = if normalize {
                strip_token(&token.text)
            } else {
                token.text
            };
            if text.is_empty() {
                None
            } else {
                Some(CleanToken {
                    text,
                    offsets: token.offsets,
                })
            }
        })
        .collect()
}

/// Finds a contiguous token run equal to the answer token sequence.
fn find_token_sequence<'a>(
    tokens: &'a [CleanToken],
    answer_texts: &[&str],
) -> Option<&'a [CleanToken]> {
    if answer_texts.is_empty() || tokens.len() < answer_texts.len() {
        return None;
    }
    tokens
        .windows(answer_texts.len())
        .find(|window| window.iter().zip(answer_texts).all(|(t, a)| t.text == *a))
}

/// Finds `needle` in `haystack` by char position, optionally
/// case-insensitively, returning the start index of the first occurrence.
fn find_chars(haystack: &[char], needle: &[char], ignore_case: bool) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    let eq = |a: char, b: char| {
        if ignore_case {
            a == b || a.to_lowercase().eq(b.to_lowercase())
        } else {
            a == b
        }
    };
    (0..=haystack.len() - needle.len())
        .find(|&i| needle.iter().enumerate().all(|(j, &c)| eq(haystack[i + j], c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::tokenize::WhitespaceTokenizer;

    fn doc(paragraphs: &[&str]) -> Document {
        Document {
            id: "100".to_string(),
            title: "Test Page".to_string(),
            paragraphs: paragraphs.iter().map(|p| (*p).to_string()).collect(),
        }
    }

    #[test]
    fn test_exact_substring_with_offsets() {
        let document = doc(&[
            "An unrelated opening paragraph.",
            "The borough is located in New York City, which is on the coast.",
        ]);
        let result = match_answer("New York City", &document, &MatchConfig::default()).unwrap();

        assert_eq!(result.paragraph, 1);
        assert_eq!(result.score, 1.0);
        let start = result.start_character.unwrap();
        let end = result.end_character.unwrap();
        assert_eq!(end - start, 13);
        let paragraph: Vec<char> = document.paragraphs[1].chars().collect();
        let sliced: String = paragraph[start..end].iter().collect();
        assert_eq!(sliced, "New York City");
    }

    #[test]
    fn test_case_insensitive_substring() {
        let document = doc(&["the capital is new york city today"]);
        let result = match_answer("New York City", &document, &MatchConfig::default()).unwrap();
        assert_eq!(result.paragraph, 0);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.start_character, Some(15));
    }

    #[test]
    fn test_first_paragraph_wins_tie() {
        let document = doc(&["answer here", "answer here"]);
        let result = match_answer("answer here", &document, &MatchConfig::default()).unwrap();
        assert_eq!(result.paragraph, 0);
    }

    #[test]
    fn test_token_sequence_match_through_punctuation() {
        // No raw substring hit (comma inside the span), but the stripped
        // token sequence lines up exactly.
        let tokenizer = WhitespaceTokenizer;
        let config = MatchConfig {
            tokenizer: Some(&tokenizer),
            ..MatchConfig::default()
        };
        let document = doc(&["He lived in Paris, France during the war."]);
        let result = match_answer("paris france", &document, &config).unwrap();

        assert_eq!(result.paragraph, 0);
        assert_eq!(result.score, 1.0);
        // Offsets cover "Paris, France" in the source text.
        assert_eq!(result.start_character, Some(12));
        assert_eq!(result.end_character, Some(25));
    }

    #[test]
    fn test_fuzzy_match_scores_scattered_ngrams() {
        let tokenizer = WhitespaceTokenizer;
        let config = MatchConfig {
            tokenizer: Some(&tokenizer),
            ..MatchConfig::default()
        };
        // Both answer 4-grams appear, but never the full 5-token sequence,
        // so only the fuzzy scan can place the span.
        let document = doc(&[
            "Nothing relevant at all over here.",
            "the tallest building in new region hosts a building in new york today",
        ]);
        let result =
            match_answer("tallest building in new york", &document, &config).unwrap();

        assert_eq!(result.paragraph, 1);
        assert!(
            result.score > 0.0 && result.score < 1.0,
            "expected fuzzy score, got {}",
            result.score
        );
        assert!(result.start_character.is_some());
        assert!(result.end_character.is_some());
    }

    #[test]
    fn test_fuzzy_without_tokenizer_has_no_offsets() {
        let document = doc(&[
            "the tallest building in new region hosts a building in new york today",
        ]);
        let result = match_answer(
            "tallest building in new york",
            &document,
            &MatchConfig::default(),
        )
        .unwrap();

        assert!(result.score > 0.0 && result.score < 1.0);
        assert_eq!(result.start_character, None);
        assert_eq!(result.end_character, None);
    }

    #[test]
    fn test_exclusion_set_blocks_paragraph() {
        let exclude: HashSet<usize> = [0].into_iter().collect();
        let config = MatchConfig {
            exclude: Some(&exclude),
            ..MatchConfig::default()
        };
        let document = doc(&["the answer is here", "something else entirely"]);
        // Paragraph 0 holds the only overlap; excluding it leaves nothing.
        assert!(match_answer("the answer is here", &document, &config).is_none());
    }

    #[test]
    fn test_fast_skips_fuzzy_fallback() {
        let config = MatchConfig {
            fast: true,
            ..MatchConfig::default()
        };
        let document = doc(&["the novel by Frank Herbert was popular"]);
        // Only a fuzzy match exists for this phrasing.
        assert!(match_answer("novel Herbert popular", &document, &config).is_none());
        // Exact matches still work in fast mode.
        assert!(match_answer("Frank Herbert", &document, &config).is_some());
    }

    #[test]
    fn test_no_overlap_fails() {
        let document = doc(&["completely unrelated text"]);
        assert!(match_answer("quantum entanglement", &document, &MatchConfig::default()).is_none());
        assert!(match_answer("   ", &document, &MatchConfig::default()).is_none());
    }

    #[test]
    fn test_candidate_cap_keeps_tie_group() {
        // Five paragraphs share one token with the answer; the tie group is
        // kept whole even though it overshoots the cap, so the best span can
        // live in any of them.
        let tokenizer = WhitespaceTokenizer;
        let config = MatchConfig {
            tokenizer: Some(&tokenizer),
            ..MatchConfig::default()
        };
        let document = doc(&[
            "herbert wrote",
            "herbert slept",
            "herbert ate",
            "herbert ran",
            "herbert dune epic story",
        ]);
        let result = match_answer("dune epic herbert", &document, &config).unwrap();
        assert_eq!(result.paragraph, 4);
    }
}

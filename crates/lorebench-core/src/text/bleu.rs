//! Sentence-level BLEU, repurposed as a fuzzy span-alignment signal.
//!
//! The span matcher scores a candidate token span against the gold answer
//! tokens. Following the reference sentence-BLEU formulation with a single
//! reference: the answer is the hypothesis and the candidate span is the
//! reference, so the brevity penalty punishes spans longer than the answer
//! and the clipped precisions punish spans missing answer n-grams.
//!
//! BLEU-4 (uniform 0.25 weights) is used when the answer has at least four
//! tokens; shorter answers degrade to uniform weights over `len(answer)`
//! n-gram orders instead of scoring zero for lack of 4-grams. No smoothing:
//! any zero n-gram precision yields a zero score, matching the reference
//! implementation's default behavior.

use std::collections::HashMap;

/// Highest n-gram order scored for a gold token sequence of the given length.
fn max_order(gold_len: usize) -> usize {
    gold_len.min(4)
}

/// Counts n-grams of the given order.
fn ngram_counts<'a>(tokens: &[&'a str], n: usize) -> HashMap<Vec<&'a str>, usize> {
    let mut counts = HashMap::new();
    if tokens.len() >= n {
        for window in tokens.windows(n) {
            *counts.entry(window.to_vec()).or_insert(0) += 1;
        }
    }
    counts
}

/// Scores a candidate token span against gold answer tokens, in `[0, 1]`.
///
/// Empty and whitespace-only tokens are filtered from both sequences first;
/// if either side ends up empty the score is 0.0. A score of 1.0 means the
/// candidate reproduces the answer exactly (up to the scored n-gram orders
/// and length).
pub fn bleu<C: AsRef<str>, G: AsRef<str>>(candidate_tokens: &[C], gold_tokens: &[G]) -> f64 {
    let candidate: Vec<&str> = candidate_tokens
        .iter()
        .map(AsRef::as_ref)
        .filter(|t| !t.trim().is_empty())
        .collect();
    let gold: Vec<&str> = gold_tokens
        .iter()
        .map(AsRef::as_ref)
        .filter(|t| !t.trim().is_empty())
        .collect();

    if candidate.is_empty() || gold.is_empty() {
        return 0.0;
    }

    let orders = max_order(gold.len());
    let weight = 1.0 / orders as f64;

    // Clipped n-gram precisions with the gold side as hypothesis.
    let mut log_sum = 0.0;
    for n in 1..=orders {
        let gold_counts = ngram_counts(&gold, n);
        let candidate_counts = ngram_counts(&candidate, n);

        let total: usize = gold_counts.values().sum();
        let clipped: usize = gold_counts
            .iter()
            .map(|(gram, &count)| count.min(candidate_counts.get(gram).copied().unwrap_or(0)))
            .sum();

        if clipped == 0 {
            return 0.0;
        }
        log_sum += weight * (clipped as f64 / total as f64).ln();
    }

    // Brevity penalty: hypothesis length c (gold) against reference length r
    // (candidate).
    let c = gold.len() as f64;
    let r = candidate.len() as f64;
    let brevity = if c > r { 1.0 } else { (1.0 - r / c).exp() };

    brevity * log_sum.exp()
}

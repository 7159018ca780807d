//! Downstream answer-quality metrics.
//!
//! Predictions are compared to every acceptable gold answer and the best
//! score counts. All three metrics operate on normalized text (lowercase,
//! punctuation and articles stripped, whitespace collapsed).

use crate::text::normalize::normalize_answer;
use std::collections::HashMap;

/// Exact match on normalized text: 1.0 or 0.0.
pub fn exact_match(prediction: &str, gold: &str) -> f64 {
    if prediction.is_empty() {
        return 0.0;
    }
    if normalize_answer(prediction) == normalize_answer(gold) {
        1.0
    } else {
        0.0
    }
}

/// Token-overlap F1 on normalized text.
pub fn f1_score(prediction: &str, gold: &str) -> f64 {
    if prediction.is_empty() {
        return 0.0;
    }
    let prediction_tokens: Vec<String> = normalize_answer(prediction)
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let gold_tokens: Vec<String> = normalize_answer(gold)
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if prediction_tokens.is_empty() || gold_tokens.is_empty() {
        return 0.0;
    }

    let mut gold_counts: HashMap<&str, usize> = HashMap::new();
    for token in &gold_tokens {
        *gold_counts.entry(token.as_str()).or_insert(0) += 1;
    }

    let mut num_same = 0;
    for token in &prediction_tokens {
        if let Some(count) = gold_counts.get_mut(token.as_str()) {
            if *count > 0 {
                *count -= 1;
                num_same += 1;
            }
        }
    }
    if num_same == 0 {
        return 0.0;
    }

    let precision = num_same as f64 / prediction_tokens.len() as f64;
    let recall = num_same as f64 / gold_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Length of the longest common subsequence of two token sequences.
fn lcs_len(a: &[&str], b: &[&str]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for token_a in a {
        for (j, token_b) in b.iter().enumerate() {
            curr[j + 1] = if token_a == token_b {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// ROUGE-L F1 on normalized text: longest-common-subsequence precision and
/// recall combined with equal weight.
pub fn rouge_l(prediction: &str, gold: &str) -> f64 {
    if prediction.is_empty() {
        return 0.0;
    }
    let prediction_norm = normalize_answer(prediction);
    let gold_norm = normalize_answer(gold);
    let prediction_tokens: Vec<&str> = prediction_norm.split_whitespace().collect();
    let gold_tokens: Vec<&str> = gold_norm.split_whitespace().collect();
    if prediction_tokens.is_empty() || gold_tokens.is_empty() {
        return 0.0;
    }

    let lcs = lcs_len(&prediction_tokens, &gold_tokens) as f64;
    if lcs == 0.0 {
        return 0.0;
    }
    let precision = lcs / prediction_tokens.len() as f64;
    let recall = lcs / gold_tokens.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Best score of `metric` for the prediction over all acceptable answers.
pub fn max_over_ground_truths<F>(metric: F, prediction: &str, ground_truths: &[String]) -> f64
where
    F: Fn(&str, &str) -> f64,
{
    ground_truths
        .iter()
        .map(|gold| metric(prediction, gold))
        .fold(0.0, f64::max)
}

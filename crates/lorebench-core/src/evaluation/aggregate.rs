//! Gold/guess alignment validation and dataset-level aggregation.
//!
//! Validation is strict: duplicate ids on either side, a missing prediction
//! for any gold id, or a size mismatch after alignment all abort the run.
//! These indicate a malformed input file and there is nothing sensible to
//! compute. Guesses are re-ordered to gold order so downstream code can zip
//! the two lists.
//!
//! Aggregation is a plain arithmetic mean of per-item metrics, guarded for
//! the empty dataset.

use crate::error::{EvalError, IntegrityError};
use crate::evaluation::downstream::{exact_match, f1_score, max_over_ground_truths, rouge_l};
use crate::evaluation::rank::{
    output_ids, ranking_metrics_for_item, rprecision, RankingMetrics,
};
use crate::record::{load_records, Output, Record};
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;

/// Default cutoffs for the retrieval section of the combined report.
const COMBINED_KS: &[usize] = &[1, 5];

/// Dataset-mean retrieval metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalReport {
    /// Mean R-precision.
    pub rprec: f64,
    /// Mean precision@k by cutoff.
    pub precision_at: BTreeMap<usize, f64>,
    /// Mean recall@k by cutoff (cutoffs above 1).
    pub recall_at: BTreeMap<usize, f64>,
    /// Mean success_rate@k by cutoff (cutoffs above 1).
    pub success_rate_at: BTreeMap<usize, f64>,
    /// Mean answer_in_context@k by cutoff.
    pub answer_in_context_at: BTreeMap<usize, f64>,
    /// Number of scored items.
    pub queries: usize,
}

impl RetrievalReport {
    fn mean_of(items: &[RankingMetrics], ks: &[usize]) -> Self {
        let mut report = Self {
            queries: items.len(),
            ..Self::default()
        };
        for &k in ks {
            if k > 0 {
                report.precision_at.insert(k, 0.0);
                report.answer_in_context_at.insert(k, 0.0);
            }
            if k > 1 {
                report.recall_at.insert(k, 0.0);
                report.success_rate_at.insert(k, 0.0);
            }
        }
        if items.is_empty() {
            return report;
        }

        let n = items.len() as f64;
        report.rprec = items.iter().map(|m| m.rprec).sum::<f64>() / n;
        for &k in ks {
            if k > 0 {
                let p: f64 = items.iter().filter_map(|m| m.precision_at.get(&k)).sum();
                let a: f64 = items
                    .iter()
                    .filter_map(|m| m.answer_in_context_at.get(&k))
                    .sum();
                report.precision_at.insert(k, p / n);
                report.answer_in_context_at.insert(k, a / n);
            }
            if k > 1 {
                let r: f64 = items.iter().filter_map(|m| m.recall_at.get(&k)).sum();
                let s: f64 = items.iter().filter_map(|m| m.success_rate_at.get(&k)).sum();
                report.recall_at.insert(k, r / n);
                report.success_rate_at.insert(k, s / n);
            }
        }
        report
    }
}

/// Dataset-mean answer-quality scores.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AnswerScores {
    /// Normalized exact match.
    pub em: f64,
    /// Token-overlap F1.
    pub f1: f64,
    /// ROUGE-L F1.
    pub rougel: f64,
}

/// Combined answer-quality and retrieval report.
#[derive(Debug, Clone, Serialize)]
pub struct DownstreamReport {
    /// Answer quality regardless of retrieval.
    pub downstream: AnswerScores,
    /// Answer quality counted only on items where retrieval found a full
    /// gold evidence set (R-precision of 1).
    pub grounded: AnswerScores,
    /// Retrieval summary over the default combined cutoffs.
    pub retrieval: RetrievalReport,
    /// Number of scored items.
    pub queries: usize,
}

/// Validates the gold/guess contract and returns guesses in gold order.
///
/// # Errors
///
/// [`IntegrityError::DuplicateGoldId`], [`IntegrityError::DuplicateGuessId`],
/// [`IntegrityError::MissingPrediction`] for an uncovered gold id, and
/// [`IntegrityError::SizeMismatch`] when predictions remain unmatched.
pub fn validate_alignment(
    gold: &[Record],
    guess: &[Record],
) -> Result<Vec<Record>, IntegrityError> {
    let mut gold_ids: Vec<&str> = Vec::with_capacity(gold.len());
    for record in gold {
        let id = record.id.trim();
        if gold_ids.contains(&id) {
            return Err(IntegrityError::DuplicateGoldId(id.to_string()));
        }
        gold_ids.push(id);
    }

    let mut by_id: HashMap<&str, &Record> = HashMap::with_capacity(guess.len());
    for record in guess {
        let id = record.id.trim();
        if by_id.insert(id, record).is_some() {
            return Err(IntegrityError::DuplicateGuessId(id.to_string()));
        }
    }

    let mut aligned = Vec::with_capacity(gold.len());
    for id in &gold_ids {
        match by_id.get(id) {
            Some(record) => aligned.push((*record).clone()),
            None => return Err(IntegrityError::MissingPrediction((*id).to_string())),
        }
    }

    if guess.len() != gold.len() {
        return Err(IntegrityError::SizeMismatch {
            gold: gold.len(),
            guess: guess.len(),
        });
    }
    Ok(aligned)
}

/// The single output of a guess record, for answer scoring.
fn single_output<'a>(guess: &'a Record) -> Result<&'a Output, IntegrityError> {
    match guess.output.as_slice() {
        [output] => Ok(output),
        _ => Err(IntegrityError::MalformedGuess(guess.id.clone())),
    }
}

/// The single provenance-bearing output of a guess record, for retrieval
/// scoring.
fn provenance_output<'a>(guess: &'a Record) -> Result<&'a Output, IntegrityError> {
    let mut with_provenance = guess.output.iter().filter(|o| !o.provenance.is_empty());
    match (with_provenance.next(), with_provenance.next()) {
        (Some(output), None) => Ok(output),
        _ => Err(IntegrityError::MalformedGuess(guess.id.clone())),
    }
}

/// Computes dataset-mean retrieval metrics over aligned records.
pub fn retrieval_metrics(
    gold: &[Record],
    guess: &[Record],
    ks: &[usize],
    rank_keys: &[String],
) -> Result<RetrievalReport, IntegrityError> {
    if gold.len() != guess.len() {
        return Err(IntegrityError::SizeMismatch {
            gold: gold.len(),
            guess: guess.len(),
        });
    }

    let mut items = Vec::with_capacity(gold.len());
    for (gold_item, guess_item) in gold.iter().zip(guess) {
        let output = provenance_output(guess_item)?;
        let predicted = output_ids(&output.provenance, rank_keys);
        items.push(ranking_metrics_for_item(
            &predicted,
            &output.provenance,
            gold_item,
            ks,
            rank_keys,
        ));
    }
    Ok(RetrievalReport::mean_of(&items, ks))
}

/// Computes the combined answer-quality and retrieval report over aligned
/// records.
pub fn downstream_metrics(
    gold: &[Record],
    guess: &[Record],
    rank_keys: &[String],
) -> Result<DownstreamReport, IntegrityError> {
    if gold.len() != guess.len() {
        return Err(IntegrityError::SizeMismatch {
            gold: gold.len(),
            guess: guess.len(),
        });
    }

    let mut downstream = AnswerScores::default();
    let mut grounded = AnswerScores::default();
    let mut ranking_items = Vec::with_capacity(gold.len());
    let total = gold.len();

    for (gold_item, guess_item) in gold.iter().zip(guess) {
        let output = single_output(guess_item)?;
        let predicted = output_ids(&output.provenance, rank_keys);
        ranking_items.push(ranking_metrics_for_item(
            &predicted,
            &output.provenance,
            gold_item,
            COMBINED_KS,
            rank_keys,
        ));

        let answer = match output.answer.as_deref() {
            Some(answer) => answer,
            None => continue,
        };
        let gold_answers = gold_item.gold_answers();

        let em = max_over_ground_truths(exact_match, answer, &gold_answers);
        let f1 = max_over_ground_truths(f1_score, answer, &gold_answers);
        let rougel = max_over_ground_truths(rouge_l, answer, &gold_answers);

        downstream.em += em;
        downstream.f1 += f1;
        downstream.rougel += rougel;

        // Answer quality only counts toward the grounded scores when
        // retrieval fully recovered one of the gold evidence sets.
        if rprecision(&predicted, gold_item, rank_keys) == 1.0 {
            grounded.em += em;
            grounded.f1 += f1;
            grounded.rougel += rougel;
        }
    }

    if total > 0 {
        let n = total as f64;
        downstream.em /= n;
        downstream.f1 /= n;
        downstream.rougel /= n;
        grounded.em /= n;
        grounded.f1 /= n;
        grounded.rougel /= n;
    }

    Ok(DownstreamReport {
        downstream,
        grounded,
        retrieval: RetrievalReport::mean_of(&ranking_items, COMBINED_KS),
        queries: total,
    })
}

/// Loads, validates, and scores a gold/guess file pair for retrieval
/// quality.
pub fn evaluate_retrieval(
    gold_path: &Path,
    guess_path: &Path,
    ks: &[usize],
    rank_keys: &[String],
) -> Result<RetrievalReport, EvalError> {
    let gold = load_records(gold_path)?;
    let guess = load_records(guess_path)?;
    let aligned = validate_alignment(&gold, &guess)?;
    Ok(retrieval_metrics(&gold, &aligned, ks, rank_keys)?)
}

/// Loads, validates, and scores a gold/guess file pair for answer quality
/// plus the combined retrieval summary.
pub fn evaluate_downstream(
    gold_path: &Path,
    guess_path: &Path,
    rank_keys: &[String],
) -> Result<DownstreamReport, EvalError> {
    let gold = load_records(gold_path)?;
    let guess = load_records(guess_path)?;
    let aligned = validate_alignment(&gold, &guess)?;
    Ok(downstream_metrics(&gold, &aligned, rank_keys)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    fn keys() -> Vec<String> {
        vec!["wikipedia_id".to_string()]
    }

    fn gold_item(id: &str, answer: &str, pages: &[&str]) -> Record {
        let provenance: Vec<serde_json::Value> = pages
            .iter()
            .map(|p| json!({"wikipedia_id": p, "title": format!("T{}", p)}))
            .collect();
        record(json!({
            "id": id, "input": format!("question {}", id),
            "output": [{"answer": answer, "provenance": provenance}]
        }))
    }

    fn guess_item(id: &str, answer: &str, pages: &[&str]) -> Record {
        let provenance: Vec<serde_json::Value> = pages
            .iter()
            .map(|p| json!({"wikipedia_id": p}))
            .collect();
        record(json!({
            "id": id, "input": "",
            "output": [{"answer": answer, "provenance": provenance}]
        }))
    }

    #[test]
    fn test_duplicate_gold_id_rejected() {
        let gold = vec![gold_item("a", "x", &["1"]), gold_item("a", "y", &["2"])];
        let guess = vec![guess_item("a", "x", &["1"])];
        let err = validate_alignment(&gold, &guess).unwrap_err();
        assert!(matches!(err, IntegrityError::DuplicateGoldId(id) if id == "a"));
    }

    #[test]
    fn test_duplicate_guess_id_rejected() {
        let gold = vec![gold_item("a", "x", &["1"])];
        let guess = vec![guess_item("a", "x", &["1"]), guess_item("a", "y", &["2"])];
        let err = validate_alignment(&gold, &guess).unwrap_err();
        assert!(matches!(err, IntegrityError::DuplicateGuessId(id) if id == "a"));
    }

    #[test]
    fn test_missing_prediction_rejected() {
        let gold = vec![gold_item("a", "x", &["1"]), gold_item("b", "y", &["2"])];
        let guess = vec![guess_item("a", "x", &["1"])];
        let err = validate_alignment(&gold, &guess).unwrap_err();
        assert!(matches!(err, IntegrityError::MissingPrediction(id) if id == "b"));
    }

    #[test]
    fn test_extra_prediction_rejected() {
        let gold = vec![gold_item("a", "x", &["1"])];
        let guess = vec![guess_item("a", "x", &["1"]), guess_item("z", "y", &["2"])];
        let err = validate_alignment(&gold, &guess).unwrap_err();
        assert!(matches!(err, IntegrityError::SizeMismatch { gold: 1, guess: 2 }));
    }

    #[test]
    fn test_alignment_reorders_to_gold() {
        let gold = vec![gold_item("a", "x", &["1"]), gold_item("b", "y", &["2"])];
        let guess = vec![guess_item("b", "y", &["2"]), guess_item("a", "x", &["1"])];
        let aligned = validate_alignment(&gold, &guess).unwrap();
        assert_eq!(aligned[0].id, "a");
        assert_eq!(aligned[1].id, "b");
    }

    #[test]
    fn test_empty_dataset_reports_zeros() {
        let report = retrieval_metrics(&[], &[], &[1, 5], &keys()).unwrap();
        assert_eq!(report.queries, 0);
        assert_eq!(report.rprec, 0.0);
        assert_eq!(report.precision_at[&1], 0.0);
        assert_eq!(report.recall_at[&5], 0.0);

        let combined = downstream_metrics(&[], &[], &keys()).unwrap();
        assert_eq!(combined.queries, 0);
        assert_eq!(combined.downstream.em, 0.0);
        assert_eq!(combined.grounded.f1, 0.0);
    }

    #[test]
    fn test_retrieval_report_means() {
        let gold = vec![gold_item("a", "x", &["1"]), gold_item("b", "y", &["2"])];
        // First item retrieves its page at rank 1, second misses entirely.
        let guess = vec![guess_item("a", "x", &["1", "9"]), guess_item("b", "y", &["8", "9"])];
        let report = retrieval_metrics(&gold, &guess, &[1, 5], &keys()).unwrap();

        assert_eq!(report.queries, 2);
        assert_eq!(report.rprec, 0.5);
        assert_eq!(report.precision_at[&1], 0.5);
        assert_eq!(report.recall_at[&5], 0.5);
        assert_eq!(report.success_rate_at[&5], 0.5);
    }

    #[test]
    fn test_guess_without_provenance_output_rejected_for_retrieval() {
        let gold = vec![gold_item("a", "x", &["1"])];
        let guess = vec![record(json!({
            "id": "a", "input": "", "output": [{"answer": "x"}]
        }))];
        let err = retrieval_metrics(&gold, &guess, &[1], &keys()).unwrap_err();
        assert!(matches!(err, IntegrityError::MalformedGuess(id) if id == "a"));
    }

    #[test]
    fn test_downstream_grounded_gated_on_full_retrieval() {
        let gold = vec![gold_item("a", "Paris", &["1"]), gold_item("b", "Lyon", &["2"])];
        // Both answers are correct, but only item "a" retrieves its page.
        let guess = vec![
            guess_item("a", "paris", &["1"]),
            guess_item("b", "lyon", &["7"]),
        ];
        let report = downstream_metrics(&gold, &guess, &keys()).unwrap();

        assert_eq!(report.queries, 2);
        assert_eq!(report.downstream.em, 1.0);
        assert_eq!(report.grounded.em, 0.5);
        assert_eq!(report.retrieval.rprec, 0.5);
    }

    #[test]
    fn test_downstream_missing_answer_counts_as_zero() {
        let gold = vec![gold_item("a", "Paris", &["1"])];
        let guess = vec![record(json!({
            "id": "a", "input": "", "output": [{"provenance": [{"wikipedia_id": "1"}]}]
        }))];
        let report = downstream_metrics(&gold, &guess, &keys()).unwrap();
        assert_eq!(report.downstream.em, 0.0);
        assert_eq!(report.queries, 1);
    }
}

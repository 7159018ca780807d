//! Retrieval ranking against alternative gold evidence sets.
//!
//! A gold item may justify its answer with several alternative evidence
//! sets, each a set of page identifiers that must all be retrieved to count
//! as one unit of recall. Ranking walks the predicted identifiers in order
//! and consumes matching members from a working copy of every set: a set's
//! position in the rank is the position of its last retrieved member. An
//! identifier belonging to several sets advances all of them.
//!
//! Identifiers are the `+`-join of one or more rank-key field values from a
//! provenance entry, so evaluations can rank by page, by page+section, or by
//! any dataset-specific key.

use crate::record::{Provenance, Record};
use crate::text::normalize::normalize_answer;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashSet;
use tracing::warn;

/// One entry of the rank vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankEntry {
    /// A predicted id completed an evidence set.
    Hit,
    /// A predicted id matched no evidence set.
    Miss,
    /// A predicted id advanced (but did not complete) the referenced
    /// evidence set. Only the most recent marker per set survives.
    Partial(usize),
}

/// Joins the configured rank-key values of a provenance entry.
///
/// Returns `None` when any key is absent, in which case the entry cannot
/// contribute to ranking.
fn join_rank_keys(provenance: &Provenance, rank_keys: &[String]) -> Option<String> {
    let mut parts = Vec::with_capacity(rank_keys.len());
    for key in rank_keys {
        match provenance.rank_value(key) {
            Some(value) => parts.push(value),
            None => {
                warn!(key = %key, "missing rank key in provenance, entry skipped");
                return None;
            }
        }
    }
    Some(parts.join("+"))
}

/// Extracts the ordered, deduplicated identifier list of one output.
pub fn output_ids(provenance: &[Provenance], rank_keys: &[String]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for entry in provenance {
        if let Some(id) = join_rank_keys(entry, rank_keys) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Collects the gold item's alternative evidence sets.
///
/// One set per provenance-bearing output; empty sets are dropped and
/// duplicate sets collapsed, preserving first-seen order.
pub fn evidence_sets(gold: &Record, rank_keys: &[String]) -> Vec<HashSet<String>> {
    let mut sets: Vec<HashSet<String>> = Vec::new();
    for output in &gold.output {
        if output.provenance.is_empty() {
            continue;
        }
        let set: HashSet<String> = output
            .provenance
            .iter()
            .filter_map(|p| join_rank_keys(p, rank_keys))
            .collect();
        if !set.is_empty() && !sets.contains(&set) {
            sets.push(set);
        }
    }
    sets
}

/// Fewest predictions needed for a meaningful recall@k: the sizes of the k
/// largest evidence sets summed, plus one per missing set when there are
/// fewer than k.
fn min_prediction_size(sets: &[HashSet<String>], k: usize) -> usize {
    let mut sizes: Vec<usize> = sets.iter().map(HashSet::len).collect();
    sizes.sort_unstable_by(|a, b| b.cmp(a));

    let covered = sizes.len().min(k);
    let sum: usize = sizes.iter().take(covered).sum();
    sum + (k - covered)
}

/// Builds the rank vector for a predicted identifier list.
///
/// Works on a fresh copy of the gold evidence sets; the gold item is never
/// mutated. Returns the vector together with the number of distinct evidence
/// sets. An empty prediction list yields an empty vector and zero sets,
/// leaving every derived metric at zero for the item.
///
/// # Panics
///
/// Panics if `k` is zero; cutoffs are validated at the boundary.
pub fn compute_rank(
    predicted_ids: &[String],
    gold: &Record,
    k: usize,
    rank_keys: &[String],
) -> (Vec<RankEntry>, usize) {
    assert!(k > 0, "k must be a positive integer");

    if predicted_ids.is_empty() {
        return (Vec::new(), 0);
    }

    let mut sets = evidence_sets(gold, rank_keys);
    let num_distinct = sets.len();

    let needed = min_prediction_size(&sets, k);
    if predicted_ids.len() < needed {
        warn!(
            provided = predicted_ids.len(),
            needed,
            k,
            "too few predictions for a robust recall@k"
        );
    }

    let mut rank: Vec<RankEntry> = Vec::with_capacity(predicted_ids.len());
    for id in predicted_ids {
        let id = id.trim();
        let mut found = false;
        for (idx, set) in sets.iter_mut().enumerate() {
            if set.remove(id) {
                found = true;
                // Only the most recent position for this set counts.
                if let Some(pos) = rank
                    .iter()
                    .position(|e| matches!(e, RankEntry::Partial(i) if *i == idx))
                {
                    rank.remove(pos);
                }
                if set.is_empty() {
                    rank.push(RankEntry::Hit);
                } else {
                    rank.push(RankEntry::Partial(idx));
                }
            }
        }
        if !found {
            rank.push(RankEntry::Miss);
        }
    }

    (rank, num_distinct)
}

fn hits_in_first_k(rank: &[RankEntry], k: usize) -> usize {
    rank.iter()
        .take(k)
        .filter(|e| matches!(e, RankEntry::Hit))
        .count()
}

/// precision@k: completed evidence sets among the first k entries, over k.
pub fn precision_at_k(rank: &[RankEntry], k: usize) -> f64 {
    hits_in_first_k(rank, k) as f64 / k as f64
}

/// recall@k: completed evidence sets among the first k entries, over the
/// number of distinct gold evidence sets. Zero (with a warning) when the
/// gold item has none.
pub fn recall_at_k(rank: &[RankEntry], num_distinct_evidence_sets: usize, k: usize) -> f64 {
    if num_distinct_evidence_sets == 0 {
        warn!("gold item has no evidence sets, recall reported as 0");
        return 0.0;
    }
    hits_in_first_k(rank, k) as f64 / num_distinct_evidence_sets as f64
}

/// success_rate@k: 1 if any evidence set is completed within the first k
/// entries.
pub fn success_rate_at_k(rank: &[RankEntry], k: usize) -> f64 {
    if hits_in_first_k(rank, k) > 0 {
        1.0
    } else {
        0.0
    }
}

/// answer_in_context@k: 1 if any of the first k predicted provenance texts
/// contains one of the gold answers after normalization.
pub fn answer_in_context_at_k(provenance: &[Provenance], gold: &Record, k: usize) -> f64 {
    let answers: Vec<String> = gold
        .gold_answers()
        .iter()
        .map(|a| normalize_answer(a))
        .collect();
    if answers.is_empty() {
        return 0.0;
    }

    for entry in provenance.iter().take(k) {
        if let Some(text) = entry.text.as_deref() {
            let context = normalize_answer(text);
            if answers.iter().any(|a| context.contains(a.as_str())) {
                return 1.0;
            }
        }
    }
    0.0
}

/// R-precision against one gold id list: of the first `R = |gold_ids|`
/// predictions, the fraction appearing in the gold list. Zero when the gold
/// list is empty.
fn rprecision_single(predicted_ids: &[String], gold_ids: &[String]) -> f64 {
    let r = gold_ids.len();
    if r == 0 {
        return 0.0;
    }
    let hits = predicted_ids
        .iter()
        .take(r)
        .filter(|id| gold_ids.iter().any(|g| g == id.trim()))
        .count();
    hits as f64 / r as f64
}

/// R-precision: the maximum [`rprecision_single`] across the gold item's
/// alternative outputs. Non-consuming; duplicate predictions were already
/// removed at extraction, so only the first R distinct predictions matter.
pub fn rprecision(predicted_ids: &[String], gold: &Record, rank_keys: &[String]) -> f64 {
    gold.output
        .iter()
        .map(|output| {
            let gold_ids = output_ids(&output.provenance, rank_keys);
            rprecision_single(predicted_ids, &gold_ids)
        })
        .fold(0.0, f64::max)
}

/// Ranking metrics for a single item.
///
/// `recall@k` and `success_rate@k` are reported for cutoffs above 1 only;
/// `precision@k` and `answer_in_context@k` for every positive cutoff.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RankingMetrics {
    /// R-precision.
    pub rprec: f64,
    /// precision@k by cutoff.
    pub precision_at: BTreeMap<usize, f64>,
    /// recall@k by cutoff.
    pub recall_at: BTreeMap<usize, f64>,
    /// success_rate@k by cutoff.
    pub success_rate_at: BTreeMap<usize, f64>,
    /// answer_in_context@k by cutoff.
    pub answer_in_context_at: BTreeMap<usize, f64>,
}

impl RankingMetrics {
    /// Zero-valued metrics for the given cutoffs, fixing the report shape.
    pub fn zeroed(ks: &[usize]) -> Self {
        let mut metrics = Self::default();
        for &k in ks {
            if k > 0 {
                metrics.precision_at.insert(k, 0.0);
                metrics.answer_in_context_at.insert(k, 0.0);
            }
            if k > 1 {
                metrics.recall_at.insert(k, 0.0);
                metrics.success_rate_at.insert(k, 0.0);
            }
        }
        metrics
    }
}

/// Computes all ranking metrics for one gold/guess pair.
///
/// `predicted_ids` and `provenance` come from the guess's single scoreable
/// output; `ks` must contain positive cutoffs only.
pub fn ranking_metrics_for_item(
    predicted_ids: &[String],
    provenance: &[Provenance],
    gold: &Record,
    ks: &[usize],
    rank_keys: &[String],
) -> RankingMetrics {
    let mut metrics = RankingMetrics::zeroed(ks);
    metrics.rprec = rprecision(predicted_ids, gold, rank_keys);

    for &k in ks {
        if k == 0 {
            continue;
        }
        let (rank, num_distinct) = compute_rank(predicted_ids, gold, k, rank_keys);

        if num_distinct > 0 {
            metrics.precision_at.insert(k, precision_at_k(&rank, k));
            if k > 1 {
                metrics
                    .recall_at
                    .insert(k, recall_at_k(&rank, num_distinct, k));
                metrics
                    .success_rate_at
                    .insert(k, success_rate_at_k(&rank, k));
            }
        }

        metrics
            .answer_in_context_at
            .insert(k, answer_in_context_at_k(provenance, gold, k));
    }

    metrics
}

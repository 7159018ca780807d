//! Retriever collaborator and prediction-file driver.
//!
//! Retrievers (dense, sparse, entity linkers, ...) are black boxes: they are
//! fed a batch of queries and return a ranked page list per query id. The
//! driver turns a gold file plus a retriever into a guess file ready for the
//! ranking evaluation, with one provenance-bearing output per item.

use crate::error::IntegrityError;
use crate::record::{Output, Provenance, Record};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// One query handed to a retriever.
#[derive(Debug, Clone)]
pub struct Query {
    /// Record id the results will be attached to.
    pub id: String,
    /// Query text.
    pub text: String,
}

/// One ranked result returned by a retriever.
#[derive(Debug, Clone)]
pub struct RetrievedPage {
    /// Page identifier, comparable to gold provenance rank keys.
    pub identifier: String,
    /// Retriever-assigned score, higher is better.
    pub score: f64,
    /// Paragraph text backing the result, when the retriever returns one.
    pub text: Option<String>,
}

/// A ranked-retrieval black box.
pub trait Retriever {
    /// Queues queries for the next [`Retriever::run`] call.
    fn feed(&mut self, queries: &[Query]);

    /// Executes all queued queries, returning a ranked page list per query
    /// id. Queued queries are consumed.
    fn run(&mut self) -> HashMap<String, Vec<RetrievedPage>>;
}

/// Runs a retriever over a gold dataset and materializes guess records.
///
/// Invalid datapoints (see [`Record::validate`]) are skipped with a warning.
/// Every fed query produces a guess record, with empty provenance when the
/// retriever returned nothing for it, so the result always aligns with the
/// filtered gold list.
///
/// # Errors
///
/// [`IntegrityError::DuplicateGoldId`] when the gold file repeats an id.
pub fn run_retrieval(
    retriever: &mut dyn Retriever,
    gold: &[Record],
    top_k: usize,
) -> Result<Vec<Record>, IntegrityError> {
    let mut queries: Vec<Query> = Vec::with_capacity(gold.len());
    let mut seen: HashSet<&str> = HashSet::with_capacity(gold.len());
    for record in gold {
        if !record.validate() {
            continue;
        }
        let id = record.id.trim();
        if !seen.insert(id) {
            return Err(IntegrityError::DuplicateGoldId(id.to_string()));
        }
        queries.push(Query {
            id: id.to_string(),
            text: record.input.clone(),
        });
    }

    retriever.feed(&queries);
    let mut results = retriever.run();
    if results.len() != queries.len() {
        warn!(
            queries = queries.len(),
            predictions = results.len(),
            "retriever returned a different number of predictions than queries"
        );
    }

    let mut guesses = Vec::with_capacity(queries.len());
    for query in &queries {
        let pages = results.remove(&query.id).unwrap_or_default();
        if pages.is_empty() {
            warn!(id = %query.id, "no retrieval results for query");
        }
        let provenance: Vec<Provenance> = pages
            .into_iter()
            .take(top_k)
            .map(|page| Provenance {
                wikipedia_id: Some(page.identifier),
                text: page.text,
                meta: Some(serde_json::json!({ "retriever_score": page.score })),
                ..Provenance::default()
            })
            .collect();
        guesses.push(Record {
            id: query.id.clone(),
            input: query.text.clone(),
            output: vec![Output {
                answer: None,
                provenance,
                meta: None,
            }],
            meta: None,
        });
    }
    Ok(guesses)
}

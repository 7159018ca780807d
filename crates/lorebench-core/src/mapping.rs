//! Fork-join chunked dataset mapping.
//!
//! Converting a raw dataset to records is embarrassingly parallel: the input
//! is split into independent chunks, each worker owns its chunk exclusively
//! and produces a private record list plus a small stats value, and the
//! coordinator reduces everything sequentially after all workers finish.
//! Chunks are contiguous slices of the input, so the reduced record list
//! preserves input order. A failing worker aborts the whole run.

use crate::error::DataError;
use crate::record::{store_records, Record};
use crate::source::KnowledgeSource;
use std::num::NonZeroUsize;
use std::path::Path;
use std::thread;
use tracing::info;

/// Splits `items` into `num` chunks of near-equal size.
///
/// The first `len % num` chunks receive one extra item. Chunks may be empty
/// when there are fewer items than chunks.
///
/// # Panics
///
/// Panics if `num` is zero.
pub fn chunk_it<T>(items: Vec<T>, num: usize) -> Vec<Vec<T>> {
    assert!(num > 0, "cannot split into zero chunks");
    let chunk_len = items.len() / num;

    let mut iter = items.into_iter();
    let mut chunks: Vec<Vec<T>> = (0..num)
        .map(|_| iter.by_ref().take(chunk_len).collect())
        .collect();
    for (i, item) in iter.enumerate() {
        chunks[i].push(item);
    }
    chunks
}

/// A dataset that can be mapped to records chunk by chunk.
///
/// Implementations hold whatever raw representation the source format uses;
/// `process_chunk` performs the per-item conversion, typically calling the
/// span matcher to attach provenance from knowledge-source pages.
pub trait ChunkedDataset {
    /// Raw item type handed to workers.
    type Item: Send;
    /// Per-chunk stats value reduced by the coordinator.
    type Stats: Send;

    /// Dataset name, for logging.
    fn name(&self) -> &str;

    /// Optional cap on the number of parallel chunks.
    fn max_chunks(&self) -> Option<usize> {
        None
    }

    /// Splits the raw input into `num` independent chunks.
    fn chunks(&self, num: usize) -> Vec<Vec<Self::Item>>;

    /// Converts one chunk into records.
    fn process_chunk(
        &self,
        chunk: Vec<Self::Item>,
        source: &dyn KnowledgeSource,
        chunk_id: usize,
    ) -> Result<(Vec<Record>, Self::Stats), DataError>;

    /// Reduces the per-chunk stats after all workers complete.
    fn postprocess(&self, stats: Vec<Self::Stats>) {
        let _ = stats;
    }
}

/// Maps a dataset to records in parallel and writes them as one record per
/// line.
///
/// Worker count is the available parallelism, capped by the dataset's
/// [`ChunkedDataset::max_chunks`] hint. Returns the number of records
/// written. The first worker error aborts the run; a panicking worker
/// propagates its panic.
pub fn map_dataset<D>(
    dataset: &D,
    source: &(dyn KnowledgeSource + Sync),
    output: &Path,
) -> Result<usize, DataError>
where
    D: ChunkedDataset + Sync,
{
    let available = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    let workers = dataset
        .max_chunks()
        .filter(|&m| m > 0)
        .map_or(available, |m| available.min(m));
    info!(dataset = dataset.name(), workers, "mapping dataset");

    let chunks = dataset.chunks(workers);
    let results: Vec<Result<(Vec<Record>, D::Stats), DataError>> = thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .into_iter()
            .enumerate()
            .map(|(chunk_id, chunk)| {
                scope.spawn(move || dataset.process_chunk(chunk, source, chunk_id))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    });

    let mut records = Vec::new();
    let mut stats = Vec::with_capacity(results.len());
    for result in results {
        let (chunk_records, chunk_stats) = result?;
        records.extend(chunk_records);
        stats.push(chunk_stats);
    }
    dataset.postprocess(stats);

    store_records(output, &records)?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{match_answer, MatchConfig};
    use crate::record::{load_records, Document, Output, Provenance};
    use crate::source::InMemoryKnowledgeSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::NamedTempFile;

    #[test]
    fn test_chunk_it_even_split() {
        let chunks = chunk_it((0..6).collect(), 3);
        assert_eq!(chunks, vec![vec![0, 1], vec![2, 3], vec![4, 5]]);
    }

    #[test]
    fn test_chunk_it_remainder_spread_from_front() {
        let chunks = chunk_it((0..7).collect(), 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], vec![0, 1, 6]);
        assert_eq!(chunks[1], vec![2, 3]);
        assert_eq!(chunks[2], vec![4, 5]);
        // every item lands in exactly one chunk
        let total: usize = chunks.iter().map(Vec::len).sum();
        assert_eq!(total, 7);
    }

    #[test]
    fn test_chunk_it_fewer_items_than_chunks() {
        let chunks = chunk_it(vec![1, 2], 4);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], vec![1]);
        assert_eq!(chunks[1], vec![2]);
        assert!(chunks[2].is_empty());
    }

    /// Toy QA dataset: items are (id, answer, page title) triples; mapping
    /// locates the answer in the page and attaches provenance.
    struct ToyDataset {
        items: Vec<(String, String, String)>,
        matched: AtomicUsize,
    }

    impl ChunkedDataset for ToyDataset {
        type Item = (String, String, String);
        type Stats = usize;

        fn name(&self) -> &str {
            "toy"
        }

        fn max_chunks(&self) -> Option<usize> {
            Some(2)
        }

        fn chunks(&self, num: usize) -> Vec<Vec<Self::Item>> {
            chunk_it(self.items.clone(), num)
        }

        fn process_chunk(
            &self,
            chunk: Vec<Self::Item>,
            source: &dyn KnowledgeSource,
            _chunk_id: usize,
        ) -> Result<(Vec<Record>, usize), DataError> {
            let mut records = Vec::with_capacity(chunk.len());
            let mut matched = 0;
            for (id, answer, title) in chunk {
                let mut provenance = Vec::new();
                if let Some(page) = source.get_page_by_title(&title) {
                    if let Some(span) =
                        match_answer(&answer, &page, &MatchConfig::default())
                    {
                        matched += 1;
                        provenance.push(Provenance {
                            wikipedia_id: Some(page.id.clone()),
                            title: Some(page.title.clone()),
                            start_paragraph_id: Some(span.paragraph as i64),
                            start_character: span
                                .start_character
                                .map_or(Some(-1), |c| Some(c as i64)),
                            end_paragraph_id: Some(span.paragraph as i64),
                            end_character: span
                                .end_character
                                .map_or(Some(-1), |c| Some(c as i64)),
                            bleu_score: Some(span.score),
                            ..Provenance::default()
                        });
                    }
                }
                records.push(Record {
                    id,
                    input: format!("where is {}", answer),
                    output: vec![Output {
                        answer: Some(answer),
                        provenance,
                        meta: None,
                    }],
                    meta: None,
                });
            }
            self.matched.fetch_add(matched, Ordering::Relaxed);
            Ok((records, matched))
        }
    }

    #[test]
    fn test_map_dataset_fork_join() {
        let source = InMemoryKnowledgeSource::from_documents(vec![Document {
            id: "1".to_string(),
            title: "Nile".to_string(),
            paragraphs: vec!["The Nile flows through Egypt to the sea.".to_string()],
        }]);
        let dataset = ToyDataset {
            items: (0..5)
                .map(|i| (format!("q{}", i), "Egypt".to_string(), "Nile".to_string()))
                .collect(),
            matched: AtomicUsize::new(0),
        };

        let out = NamedTempFile::new().unwrap();
        let written = map_dataset(&dataset, &source, out.path()).unwrap();
        assert_eq!(written, 5);
        assert_eq!(dataset.matched.load(Ordering::Relaxed), 5);

        let records = load_records(out.path()).unwrap();
        assert_eq!(records.len(), 5);
        // contiguous chunks keep input order through the reduce
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["q0", "q1", "q2", "q3", "q4"]);
        assert_eq!(
            records[0].output[0].provenance[0].bleu_score,
            Some(1.0)
        );
    }
}

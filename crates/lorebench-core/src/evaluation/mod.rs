//! Evaluation of system outputs against gold annotations.
//!
//! Two axes, mirroring how knowledge-intensive tasks are scored:
//!
//! - [`rank`] - retrieval quality: a ranked list of predicted page
//!   identifiers scored against alternative gold evidence sets
//!   (precision@k, recall@k, success-rate@k, R-precision,
//!   answer-in-context@k)
//! - [`downstream`] - answer quality: exact match, token F1, and ROUGE-L
//!   over normalized answers, maximized across acceptable gold answers
//! - [`aggregate`] - strict gold/guess alignment validation and dataset-level
//!   averaging of both metric families

pub mod aggregate;
pub mod downstream;
pub mod rank;

pub use aggregate::{
    evaluate_downstream, evaluate_retrieval, validate_alignment, DownstreamReport,
    RetrievalReport,
};
pub use rank::{compute_rank, evidence_sets, RankEntry, RankingMetrics};

//! # Lorebench Core
//!
//! Evidence matching and retrieval-ranking evaluation for knowledge-intensive
//! language tasks.
//!
//! This crate converts heterogeneous QA / fact-verification / entity-linking
//! datasets into a unified record format, attaches span-level provenance by
//! locating answers inside knowledge-source pages, and scores system outputs
//! against gold annotations along two axes: downstream answer quality and
//! retrieval quality.
//!
//! ## Modules
//!
//! - [`record`] - Unified record format and newline-delimited JSON I/O
//! - [`text`] - Shared text primitives: normalization, BLEU, span tokenization
//! - [`matching`] - Fuzzy answer-span matching inside documents
//! - [`evaluation`] - Ranking metrics, downstream metrics, and aggregation
//! - [`source`] - Knowledge-source lookup trait and in-memory implementation
//! - [`retrieve`] - Retriever trait and prediction-file driver
//! - [`mapping`] - Fork-join chunked dataset mapping
//! - [`config`] - Default cutoffs and matcher constants
//! - [`error`] - Error types shared across the crate

pub mod config;
pub mod error;
pub mod evaluation;
pub mod mapping;
pub mod matching;
pub mod record;
pub mod retrieve;
pub mod source;
pub mod text;

pub use error::{DataError, EvalError, IntegrityError, TokenizeError};
pub use matching::{match_answer, MatchConfig, SpanMatch};
pub use record::{load_records, store_records, Document, Output, Provenance, Record};

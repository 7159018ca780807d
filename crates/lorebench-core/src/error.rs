//! Error types for lorebench-core.
//!
//! Three tiers, matching how each failure is handled:
//!
//! - [`IntegrityError`] - structural violations of the gold/guess contract
//!   (duplicate ids, size mismatch, missing predictions). Fatal; the run
//!   aborts because the input file is malformed.
//! - [`DataError`] - I/O and parse failures while reading record files.
//! - [`TokenizeError`] - tokenizer failures. At the span-matcher level these
//!   are recoverable: the matcher reports "no match" instead of aborting.

use thiserror::Error;

/// Structural violations of the gold/guess alignment contract.
#[derive(Debug, Error)]
pub enum IntegrityError {
    /// The gold file contains the same id twice.
    #[error("gold ids must be unique (duplicate: {0})")]
    DuplicateGoldId(String),
    /// The prediction file contains the same id twice.
    #[error("prediction ids must be unique (duplicate: {0})")]
    DuplicateGuessId(String),
    /// A gold id has no corresponding prediction.
    #[error("no prediction provided for id: {0}")]
    MissingPrediction(String),
    /// Gold and guess datasets differ in size after alignment.
    #[error("different dataset sizes (gold: {gold}, guess: {guess})")]
    SizeMismatch {
        /// Number of gold records.
        gold: usize,
        /// Number of guess records.
        guess: usize,
    },
    /// A prediction does not carry exactly one scoreable output.
    #[error("prediction {0} must provide exactly one scoreable output")]
    MalformedGuess(String),
}

/// Failures while reading or writing record files.
#[derive(Debug, Error)]
pub enum DataError {
    /// Underlying file I/O failed.
    #[error("failed to access {path}: {source}")]
    Io {
        /// Path of the offending file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A line could not be parsed as a record.
    #[error("{path}:{line}: invalid record: {source}")]
    Parse {
        /// Path of the offending file.
        path: String,
        /// 1-based line number.
        line: usize,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Tokenizer failures during span matching.
#[derive(Debug, Error)]
pub enum TokenizeError {
    /// The tokenizer could not be constructed.
    #[error("tokenizer unavailable: {0}")]
    Unavailable(String),
    /// Encoding a text failed.
    #[error("tokenization failed: {0}")]
    Failed(String),
}

/// Top-level error for evaluation entry points.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Record file could not be read or parsed.
    #[error(transparent)]
    Data(#[from] DataError),
    /// Gold/guess contract violated.
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

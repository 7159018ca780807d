//! Shared text primitives.
//!
//! - [`normalize`] - answer normalization used by exact-match style metrics
//! - [`bleu`] - sentence-level BLEU used as the fuzzy span-match signal
//! - [`tokenize`] - span tokenizer capability with character offsets

pub mod bleu;
pub mod normalize;
pub mod tokenize;

pub use bleu::bleu;
pub use normalize::{normalize_answer, strip_token};
pub use tokenize::{HfTokenizer, SpanToken, SpanTokenizer, WhitespaceTokenizer};

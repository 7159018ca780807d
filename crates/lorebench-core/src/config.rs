//! Default evaluation and matching constants.

/// Default rank cutoffs for precision@k / recall@k reports.
pub const DEFAULT_KS: &[usize] = &[1, 5, 10, 20];

/// Default provenance field used to identify a retrieved page.
pub const DEFAULT_RANK_KEY: &str = "wikipedia_id";

/// Maximum number of paragraphs handed to the fuzzy span scan.
///
/// The token-intersection pre-filter keeps at least this many of the most
/// promising paragraphs; a full tie group is kept even when it overshoots.
pub const DEFAULT_PARAGRAPH_CANDIDATES: usize = 3;

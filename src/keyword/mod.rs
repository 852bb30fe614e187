//! Tantivy-backed keyword retrieval and rank fusion.
//!
//! BM25 scoring over the routable-item fields (identifier, intents, routing
//! keywords, description) plus weighted Reciprocal Rank Fusion for combining
//! the keyword stream with vector search results.

pub mod fusion;
pub mod index;

pub use fusion::{apply_weighted_rrf, HybridHit};
pub use index::{KeywordDoc, KeywordHit, KeywordIndex};

/// RRF k parameter. Small k sharpens the gap between adjacent ranks, which
/// matters for precision-critical tool routing; k=60 leaves rank-1 and
/// rank-5 within single-digit percent of each other.
pub const RRF_K: f32 = 10.0;

/// Vector-stream weight in hybrid fusion.
pub const SEMANTIC_WEIGHT: f32 = 1.0;

/// Keyword-stream weight in hybrid fusion. BM25 hits are precise anchors
/// for identifier-heavy corpora, so they weigh more than the dense stream.
pub const KEYWORD_WEIGHT: f32 = 1.5;

/// Additive boost per distinct query token found in the item identifier.
/// RRF scores live around 0.1 per rank, so the boost stays small.
pub const NAME_TOKEN_BOOST: f32 = 0.2;

/// Additive boost when the full query appears verbatim in the identifier
/// (case-insensitive, identifier separators normalized to spaces).
pub const EXACT_PHRASE_BOOST: f32 = 0.5;

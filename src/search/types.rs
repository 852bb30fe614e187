//! Search result types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::calibrate::Confidence;

/// One row from a vector-only search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorHit {
    /// Row id.
    pub id: String,
    /// Item identifier; falls back to the row id for non-routable rows.
    pub name: String,
    /// Row content.
    pub content: String,
    /// L2 distance to the query vector (smaller is closer).
    pub distance: f32,
    /// Parsed metadata JSON (`Null` when absent).
    pub metadata: Value,
}

/// One ranked item from the intent-driven `search` entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Item identifier.
    pub name: String,
    /// Row content (empty for keyword-only hits without a stored row).
    pub content: String,
    /// Calibrated display score in 0–1.
    pub score: f32,
    /// Raw strategy score before calibration (fused RRF, BM25, or
    /// distance-derived similarity depending on the strategy).
    pub raw_score: f32,
    /// Vector-stream similarity, 0.0 when the stream did not contribute.
    pub vector_score: f32,
    /// Keyword-stream BM25 score, 0.0 when the stream did not contribute.
    pub keyword_score: f32,
    /// Discrete confidence label from the calibration profile.
    pub confidence: Confidence,
    /// Parsed metadata JSON (`Null` when absent).
    pub metadata: Value,
}

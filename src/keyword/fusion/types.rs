//! Fusion result types.

use serde::{Deserialize, Serialize};

/// One fused candidate: the raw per-stream scores plus the boosted RRF score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridHit {
    /// Item identifier.
    pub name: String,
    /// Weighted RRF score after field boosting; unbounded above 1.0.
    pub rrf_score: f32,
    /// Vector-stream score (`1 / (1 + distance)`), 0.0 when absent.
    pub vector_score: f32,
    /// Keyword-stream BM25 score, 0.0 when absent.
    pub keyword_score: f32,
}

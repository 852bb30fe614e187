//! Compute kernels for fusion: RRF term and distance-to-score.

/// RRF term for a 0-indexed rank: `1 / (k + rank + 1)`.
#[inline]
#[must_use]
pub fn rrf_term(k: f32, rank: usize) -> f32 {
    let rank_f32 = f32::from(u16::try_from(rank).unwrap_or(u16::MAX));
    1.0 / (k + rank_f32 + 1.0)
}

/// Distance to a 0–1 similarity score: `1 / (1 + distance)`.
#[inline]
#[must_use]
pub fn distance_to_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

//! Rank fusion for hybrid retrieval: weighted RRF plus field boosting.

pub mod kernels;
pub mod match_util;
pub mod types;
pub mod weighted_rrf;

pub use types::HybridHit;
pub use weighted_rrf::apply_weighted_rrf;

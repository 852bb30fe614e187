//! Search surfaces: vector-only, keyword-only, full-text, hybrid fusion,
//! and the intent-driven `search` entry point with confidence calibration.

pub mod agentic;
pub mod calibrate;
pub mod hybrid_search;
pub mod intent;
pub mod options;
pub mod types;
pub mod vector_search;

pub use agentic::SearchConfig;
pub use calibrate::{CalibrationBand, CalibrationProfile, Confidence};
pub use intent::{IntentClassifier, QueryIntent, RuleIntentClassifier};
pub use options::SearchOptions;
pub use types::{SearchHit, VectorHit};

//! Query intent classification and retrieval-strategy selection.
//!
//! An explicit caller override always wins. Otherwise the store's
//! classifier decides; a pluggable (possibly model-backed) classifier runs
//! under a hard timeout and fails open to the rule-based default.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;
use crate::record::is_identifier_shaped;

/// Hard deadline for a pluggable classifier before falling back to rules.
pub const CLASSIFIER_TIMEOUT: Duration = Duration::from_millis(250);

/// Query intent for strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// Exact identifier or command match; wants keyword-only retrieval.
    Exact,
    /// Filter-forward category browse (retrieves like Hybrid).
    Category,
    /// Semantic similarity only (vector-only).
    Semantic,
    /// Dual-stream vector + keyword fusion (default).
    Hybrid,
}

impl Default for QueryIntent {
    fn default() -> Self {
        Self::Hybrid
    }
}

impl FromStr for QueryIntent {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "exact" => QueryIntent::Exact,
            "category" => QueryIntent::Category,
            "semantic" => QueryIntent::Semantic,
            _ => QueryIntent::Hybrid,
        })
    }
}

/// Pluggable intent classifier. Implementations may call out to a model;
/// the search path bounds them with [`CLASSIFIER_TIMEOUT`].
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Classify a query's intent.
    async fn classify(&self, query: &str) -> Result<QueryIntent, RetrievalError>;
}

/// Rule-based classifier: identifier-shaped queries (`git.commit`) are
/// Exact, everything else Hybrid.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleIntentClassifier;

impl RuleIntentClassifier {
    /// Synchronous rule evaluation, also used as the fail-open fallback.
    #[must_use]
    pub fn classify_rule(query: &str) -> QueryIntent {
        if is_identifier_shaped(query.trim()) {
            QueryIntent::Exact
        } else {
            QueryIntent::Hybrid
        }
    }
}

#[async_trait]
impl IntentClassifier for RuleIntentClassifier {
    async fn classify(&self, query: &str) -> Result<QueryIntent, RetrievalError> {
        Ok(Self::classify_rule(query))
    }
}

/// Concrete retrieval strategy after intent resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchStrategy {
    KeywordOnly,
    VectorOnly,
    Hybrid,
}

/// Resolve an intent to a strategy given what the store can actually run.
///
/// Exact without a keyword index is `IndexUnavailable`; the search entry
/// point recovers it by retrying as Hybrid, so callers never see it.
pub(crate) fn resolve_strategy(
    intent: QueryIntent,
    table_name: &str,
    keyword_available: bool,
    has_query_text: bool,
) -> Result<SearchStrategy, RetrievalError> {
    match intent {
        QueryIntent::Exact => {
            if !has_query_text {
                Ok(SearchStrategy::Hybrid)
            } else if keyword_available {
                Ok(SearchStrategy::KeywordOnly)
            } else {
                Err(RetrievalError::IndexUnavailable {
                    table: table_name.to_string(),
                    index: "keyword".to_string(),
                })
            }
        }
        QueryIntent::Semantic => Ok(SearchStrategy::VectorOnly),
        QueryIntent::Category | QueryIntent::Hybrid => {
            if keyword_available && has_query_text {
                Ok(SearchStrategy::Hybrid)
            } else {
                Ok(SearchStrategy::VectorOnly)
            }
        }
    }
}

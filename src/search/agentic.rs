//! Intent-driven search entry point: classify, pick a strategy, run it,
//! calibrate, record metrics.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;

use crate::error::RetrievalError;
use crate::keyword::fusion::kernels::distance_to_score;
use crate::search::intent::{
    resolve_strategy, QueryIntent, RuleIntentClassifier, SearchStrategy, CLASSIFIER_TIMEOUT,
};
use crate::search::options::SearchOptions;
use crate::search::types::SearchHit;
use crate::RetrievalStore;

/// Configuration for the intent-driven `search` entry point.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Max number of results to return.
    pub limit: usize,
    /// Minimum calibrated score (0.0–1.0); 0.0 disables the cut.
    pub threshold: f32,
    /// Caller-supplied intent; overrides the classifier when set.
    pub intent: Option<QueryIntent>,
    /// Only items from this skill (identifier prefix before the first `.`).
    pub skill_filter: Option<String>,
    /// Only items in this category.
    pub category_filter: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: 0.2,
            intent: None,
            skill_filter: None,
            category_filter: None,
        }
    }
}

/// Single-quote doubling for a Lance SQL predicate value.
fn escape_sql_value(s: &str) -> String {
    s.replace('\'', "''")
}

impl RetrievalStore {
    /// Intent-aware search. The caller's `config.intent` wins; otherwise the
    /// store's classifier decides under a hard timeout, failing open to the
    /// rule-based default. Exact intent wants keyword-only retrieval and
    /// falls back to hybrid when the keyword index is disabled.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::TableNotFound`] if the table doesn't exist, plus
    /// the underlying strategy's errors (`DimensionMismatch` etc.).
    pub async fn search(
        &self,
        table_name: &str,
        query_vector: &[f32],
        query_text: Option<&str>,
        config: SearchConfig,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let start = Instant::now();

        let intent = match config.intent {
            Some(intent) => intent,
            None => self.classify_intent(query_text.unwrap_or_default()).await,
        };

        let has_text = query_text.map(str::trim).is_some_and(|t| !t.is_empty());
        let strategy = match resolve_strategy(
            intent,
            table_name,
            self.keyword_index().is_some(),
            has_text,
        ) {
            Ok(strategy) => strategy,
            Err(RetrievalError::IndexUnavailable { .. }) => {
                log::debug!("exact intent without keyword index, retrying as hybrid");
                resolve_strategy(QueryIntent::Hybrid, table_name, false, query_text.is_some())?
            }
            Err(e) => return Err(e),
        };

        // A vector-less call can still be served by the keyword stream.
        let strategy = if query_vector.is_empty()
            && !matches!(strategy, SearchStrategy::KeywordOnly)
        {
            if self.keyword_index().is_some() && has_text {
                log::debug!("no query vector supplied, using keyword-only retrieval");
                SearchStrategy::KeywordOnly
            } else {
                return Err(RetrievalError::InvalidConfig(
                    "search needs a query vector, or query text with the keyword index enabled"
                        .to_string(),
                ));
            }
        } else {
            strategy
        };

        let where_filter = self.build_filter(&config);
        let mut hits = match strategy {
            SearchStrategy::KeywordOnly => {
                self.keyword_only_hits(table_name, query_text.unwrap_or_default(), &config)
                    .await?
            }
            SearchStrategy::VectorOnly => {
                self.vector_only_hits(table_name, query_vector, &config, where_filter)
                    .await?
            }
            SearchStrategy::Hybrid => {
                self.hybrid_hits(table_name, query_vector, query_text, &config, where_filter)
                    .await?
            }
        };

        if config.threshold > 0.0 {
            hits.retain(|h| h.score >= config.threshold);
        }
        hits.truncate(config.limit);

        self.record_query(table_name, start.elapsed().as_millis() as u64);
        Ok(hits)
    }

    /// Classifier with fail-open: timeout or error falls back to the rule.
    async fn classify_intent(&self, query: &str) -> QueryIntent {
        let Some(classifier) = self.intent_classifier() else {
            return RuleIntentClassifier::classify_rule(query);
        };
        match tokio::time::timeout(CLASSIFIER_TIMEOUT, classifier.classify(query)).await {
            Ok(Ok(intent)) => intent,
            Ok(Err(e)) => {
                log::warn!("intent classifier failed ({e}), using rule default");
                RuleIntentClassifier::classify_rule(query)
            }
            Err(_) => {
                log::warn!(
                    "intent classifier exceeded {}ms, using rule default",
                    CLASSIFIER_TIMEOUT.as_millis()
                );
                RuleIntentClassifier::classify_rule(query)
            }
        }
    }

    fn build_filter(&self, config: &SearchConfig) -> Option<String> {
        let mut preds = Vec::new();
        if let Some(s) = &config.skill_filter {
            preds.push(format!("skill_name = '{}'", escape_sql_value(s)));
        }
        if let Some(c) = &config.category_filter {
            preds.push(format!("category = '{}'", escape_sql_value(c)));
        }
        if preds.is_empty() {
            None
        } else {
            Some(preds.join(" AND "))
        }
    }

    fn keyword_hit_passes(&self, name: &str, category: &str, config: &SearchConfig) -> bool {
        if let Some(skill) = &config.skill_filter {
            if name.split('.').next().unwrap_or("") != skill {
                return false;
            }
        }
        if let Some(cat) = &config.category_filter {
            if category != cat {
                return false;
            }
        }
        true
    }

    async fn keyword_only_hits(
        &self,
        table_name: &str,
        query: &str,
        config: &SearchConfig,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let raw = self
            .keyword_search(table_name, query, config.limit.saturating_mul(2))
            .await?;
        Ok(raw
            .into_iter()
            .filter(|h| self.keyword_hit_passes(&h.name, &h.category, config))
            .map(|h| {
                let (confidence, score) = self.calibration().calibrate(h.score);
                SearchHit {
                    name: h.name,
                    content: h.description,
                    score,
                    raw_score: h.score,
                    vector_score: 0.0,
                    keyword_score: h.score,
                    confidence,
                    metadata: h.metadata,
                }
            })
            .collect())
    }

    async fn vector_only_hits(
        &self,
        table_name: &str,
        query_vector: &[f32],
        config: &SearchConfig,
        where_filter: Option<String>,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let options = SearchOptions {
            where_filter,
            ..SearchOptions::default()
        };
        let hits = self
            .vector_search(table_name, query_vector.to_vec(), config.limit, options)
            .await?;
        Ok(hits
            .into_iter()
            .map(|h| {
                let raw = distance_to_score(h.distance);
                let (confidence, score) = self.calibration().calibrate(raw);
                SearchHit {
                    name: h.name,
                    content: h.content,
                    score,
                    raw_score: raw,
                    vector_score: raw,
                    keyword_score: 0.0,
                    confidence,
                    metadata: h.metadata,
                }
            })
            .collect())
    }

    async fn hybrid_hits(
        &self,
        table_name: &str,
        query_vector: &[f32],
        query_text: Option<&str>,
        config: &SearchConfig,
        where_filter: Option<String>,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let text = query_text.unwrap_or_default();
        let options = SearchOptions {
            where_filter,
            ..SearchOptions::default()
        };

        // Hold row context from the vector stream so fused hits keep their
        // content and metadata.
        let fetch = config.limit.saturating_mul(2);
        let vector_hits = self
            .vector_search(table_name, query_vector.to_vec(), fetch, options)
            .await?;
        let mut row_context: HashMap<String, (String, Value)> = vector_hits
            .iter()
            .map(|h| (h.name.clone(), (h.content.clone(), h.metadata.clone())))
            .collect();

        let vector_scores: Vec<(String, f32)> = vector_hits
            .iter()
            .map(|h| (h.name.clone(), distance_to_score(h.distance)))
            .collect();

        let kw_results: Vec<_> = if self.keyword_index().is_some() && !text.trim().is_empty() {
            match self.keyword_search(table_name, text, fetch).await {
                Ok(results) => results
                    .into_iter()
                    .filter(|h| self.keyword_hit_passes(&h.name, &h.category, config))
                    .collect(),
                Err(e) => {
                    log::debug!("keyword stream failed, fusing vector-only: {e}");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        for h in &kw_results {
            row_context
                .entry(h.name.clone())
                .or_insert_with(|| (h.description.clone(), h.metadata.clone()));
        }

        let fused = crate::keyword::apply_weighted_rrf(
            vector_scores,
            kw_results,
            crate::keyword::RRF_K,
            crate::keyword::SEMANTIC_WEIGHT,
            crate::keyword::KEYWORD_WEIGHT,
            text,
        );

        Ok(fused
            .into_iter()
            .map(|h| {
                let (content, metadata) = row_context
                    .remove(&h.name)
                    .unwrap_or_else(|| (String::new(), Value::Null));
                let (confidence, score) = self.calibration().calibrate(h.rrf_score);
                SearchHit {
                    name: h.name,
                    content,
                    score,
                    raw_score: h.rrf_score,
                    vector_score: h.vector_score,
                    keyword_score: h.keyword_score,
                    confidence,
                    metadata,
                }
            })
            .collect())
    }
}

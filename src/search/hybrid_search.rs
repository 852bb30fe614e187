//! Hybrid search: dense vector stream + BM25 keyword stream, fused with
//! weighted RRF and field boosting.

use crate::error::RetrievalError;
use crate::keyword::fusion::kernels::distance_to_score;
use crate::keyword::{
    apply_weighted_rrf, HybridHit, KeywordHit, KEYWORD_WEIGHT, RRF_K, SEMANTIC_WEIGHT,
};
use crate::search::options::SearchOptions;
use crate::RetrievalStore;

impl RetrievalStore {
    /// Dual-engine hybrid search over one table.
    ///
    /// The vector stream comes from Lance, the keyword stream from Tantivy
    /// (run under `spawn_blocking`); both over-fetch `2 * limit` before
    /// fusion. A keyword parse failure (e.g. a query full of operator
    /// characters) degrades to vector-only rather than failing the call.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::TableNotFound`] if the table doesn't exist,
    /// [`RetrievalError::IndexUnavailable`] if the keyword index is
    /// disabled.
    pub async fn hybrid_search(
        &self,
        table_name: &str,
        query: &str,
        query_vector: Vec<f32>,
        limit: usize,
        options: SearchOptions,
    ) -> Result<Vec<HybridHit>, RetrievalError> {
        let keyword_index = self
            .keyword_index()
            .ok_or_else(|| RetrievalError::IndexUnavailable {
                table: table_name.to_string(),
                index: "keyword".to_string(),
            })?
            .clone();

        let fetch = limit.saturating_mul(2);
        let vector_future = self.vector_search(table_name, query_vector, fetch, options);

        let kw_table = table_name.to_string();
        let kw_query = query.to_string();
        let kw_future = tokio::task::spawn_blocking(move || {
            keyword_index.search(&kw_query, fetch, Some(&kw_table))
        });

        let vector_results = vector_future.await?;
        let kw_results: Vec<KeywordHit> = match kw_future.await? {
            Ok(results) => results,
            Err(e) => {
                log::debug!("keyword search failed, degrading to vector-only: {e}");
                Vec::new()
            }
        };

        let vector_scores: Vec<(String, f32)> = vector_results
            .iter()
            .map(|r| (r.name.clone(), distance_to_score(r.distance)))
            .collect();

        let fused = apply_weighted_rrf(
            vector_scores,
            kw_results,
            RRF_K,
            SEMANTIC_WEIGHT,
            KEYWORD_WEIGHT,
            query,
        );

        Ok(fused.into_iter().take(limit).collect())
    }
}

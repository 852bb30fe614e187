//! Full-text (inverted) index over the content column, used by
//! [`crate::RetrievalStore::fts_search`].

use std::time::Instant;

use lance_index::scalar::inverted::tokenizer::InvertedIndexParams;
use lance_index::traits::DatasetIndexExt;
use lance_index::IndexType;

use crate::error::RetrievalError;
use crate::schema::CONTENT_COLUMN;
use crate::{IndexOutcome, IndexStats, RetrievalStore};

/// Name registered for the inverted index on `content`.
pub const FTS_INDEX_NAME: &str = "content_fts";

impl RetrievalStore {
    /// Create (or replace) the inverted index on the content column.
    /// Skipped for empty tables.
    pub async fn create_fts_index(
        &self,
        table_name: &str,
    ) -> Result<IndexOutcome, RetrievalError> {
        let mut dataset = self.open_table(table_name).await?;
        let num_rows = dataset.count_rows(None).await?;
        if num_rows == 0 {
            return Ok(IndexOutcome::Skipped {
                reason: "table is empty".to_string(),
            });
        }

        let params = InvertedIndexParams::default();
        let start = Instant::now();
        dataset
            .create_index(
                &[CONTENT_COLUMN],
                IndexType::Inverted,
                Some(FTS_INDEX_NAME.to_string()),
                &params,
                true,
            )
            .await?;
        self.refresh_cached(table_name, dataset).await;

        Ok(IndexOutcome::Built(IndexStats {
            column: CONTENT_COLUMN.to_string(),
            index_type: "inverted".to_string(),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }))
    }
}

//! Scalar index builders: BTree, Bitmap, and cardinality-driven selection.

use std::collections::HashSet;
use std::time::Instant;

use futures::TryStreamExt;
use lance_index::scalar::{BuiltinIndexType, ScalarIndexParams};
use lance_index::traits::DatasetIndexExt;
use lance_index::IndexType;

use crate::error::RetrievalError;
use crate::schema::utf8_at;
use crate::{IndexOutcome, IndexStats, RetrievalStore};

/// Cardinality below which a Bitmap index is preferred.
const BITMAP_CARDINALITY_THRESHOLD: usize = 100;
/// Cardinality at which we still build BTree but suggest partitioning.
const HIGH_CARDINALITY_THRESHOLD: usize = 10_000;
/// Sample size for cardinality estimation (distinct count over first N rows).
const CARDINALITY_SAMPLE_LIMIT: i64 = 2000;

impl RetrievalStore {
    /// Create a BTree index on a column for exact-match and range filters.
    pub async fn create_btree_index(
        &self,
        table_name: &str,
        column: &str,
    ) -> Result<IndexOutcome, RetrievalError> {
        self.create_scalar_index(table_name, column, BuiltinIndexType::BTree, "btree")
            .await
    }

    /// Create a Bitmap index on a low-cardinality column.
    pub async fn create_bitmap_index(
        &self,
        table_name: &str,
        column: &str,
    ) -> Result<IndexOutcome, RetrievalError> {
        self.create_scalar_index(table_name, column, BuiltinIndexType::Bitmap, "bitmap")
            .await
    }

    async fn create_scalar_index(
        &self,
        table_name: &str,
        column: &str,
        builtin: BuiltinIndexType,
        label: &str,
    ) -> Result<IndexOutcome, RetrievalError> {
        let mut dataset = self.open_table(table_name).await?;
        if dataset.count_rows(None).await? == 0 {
            return Ok(IndexOutcome::Skipped {
                reason: "table is empty".to_string(),
            });
        }
        let params = ScalarIndexParams::for_builtin(builtin.clone());
        let index_name = format!("scalar_{column}_{label}");
        let index_type = match builtin {
            BuiltinIndexType::Bitmap => IndexType::Bitmap,
            _ => IndexType::BTree,
        };

        let start = Instant::now();
        dataset
            .create_index(&[column], index_type, Some(index_name), &params, true)
            .await?;
        self.refresh_cached(table_name, dataset).await;

        Ok(IndexOutcome::Built(IndexStats {
            column: column.to_string(),
            index_type: label.to_string(),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }))
    }

    /// Estimate the number of distinct values in a column over a bounded
    /// sample.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::ColumnNotFound`] when the column doesn't exist.
    pub async fn estimate_cardinality(
        &self,
        table_name: &str,
        column: &str,
    ) -> Result<usize, RetrievalError> {
        let dataset = self.open_table(table_name).await?;
        if dataset.schema().field(column).is_none() {
            return Err(RetrievalError::ColumnNotFound {
                table: table_name.to_string(),
                column: column.to_string(),
            });
        }
        let mut scanner = dataset.scan();
        scanner.project(&[column])?;
        scanner.limit(Some(CARDINALITY_SAMPLE_LIMIT), None)?;
        let mut stream = scanner.try_into_stream().await?;

        let mut distinct = HashSet::new();
        while let Some(batch) = stream.try_next().await? {
            let col =
                batch
                    .column_by_name(column)
                    .ok_or_else(|| RetrievalError::ColumnNotFound {
                        table: table_name.to_string(),
                        column: column.to_string(),
                    })?;
            for i in 0..col.len() {
                let s = utf8_at(col.as_ref(), i);
                if !s.is_empty() {
                    distinct.insert(s);
                }
            }
        }
        Ok(distinct.len())
    }

    /// Pick and build the best scalar index for a column: Bitmap below 100
    /// distinct values, BTree otherwise.
    pub async fn create_optimal_scalar_index(
        &self,
        table_name: &str,
        column: &str,
    ) -> Result<IndexOutcome, RetrievalError> {
        let cardinality = self.estimate_cardinality(table_name, column).await?;
        if cardinality < BITMAP_CARDINALITY_THRESHOLD {
            self.create_bitmap_index(table_name, column).await
        } else {
            if cardinality >= HIGH_CARDINALITY_THRESHOLD {
                log::warn!(
                    "high cardinality column '{column}' (est. {cardinality}) may benefit from partitioning"
                );
            }
            self.create_btree_index(table_name, column).await
        }
    }
}

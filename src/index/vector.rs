//! Vector index builders: IVF+HNSW for smaller tables, IVF_FLAT above.

use std::time::Instant;

use lance::index::vector::VectorIndexParams;
use lance_index::traits::DatasetIndexExt;
use lance_index::vector::hnsw::builder::HnswBuildParams;
use lance_index::vector::ivf::IvfBuildParams;
use lance_index::IndexType;
use lance_linalg::distance::DistanceType;

use crate::error::RetrievalError;
use crate::schema::VECTOR_COLUMN;
use crate::{IndexOutcome, IndexStats, RetrievalStore};

/// Row count at and above which IVF_FLAT replaces IVF+HNSW.
const HNSW_ROW_THRESHOLD: usize = 10_000;
/// Minimum rows for an HNSW build.
const HNSW_ROW_FLOOR: usize = 50;
/// Minimum rows before any vector index is worth building.
const VECTOR_INDEX_ROW_FLOOR: usize = 100;
/// Default IVF partition ceiling for HNSW.
const HNSW_DEFAULT_PARTITIONS: usize = 64;

impl RetrievalStore {
    /// Create an IVF+HNSW index (higher recall, more memory; best below
    /// ~100k vectors). Skipped below [`HNSW_ROW_FLOOR`] rows.
    pub async fn create_hnsw_index(
        &self,
        table_name: &str,
    ) -> Result<IndexOutcome, RetrievalError> {
        let mut dataset = self.open_table(table_name).await?;
        let num_rows = dataset.count_rows(None).await?;
        if num_rows < HNSW_ROW_FLOOR {
            return Ok(IndexOutcome::Skipped {
                reason: format!("{num_rows} rows is below the {HNSW_ROW_FLOOR}-row HNSW floor"),
            });
        }

        let num_partitions = (num_rows / 128).clamp(8, HNSW_DEFAULT_PARTITIONS);
        let ivf = IvfBuildParams::new(num_partitions);
        let hnsw = HnswBuildParams::default();
        let params = VectorIndexParams::ivf_hnsw(DistanceType::L2, ivf, hnsw);

        let start = Instant::now();
        dataset
            .create_index(&[VECTOR_COLUMN], IndexType::Vector, None, &params, true)
            .await?;
        self.refresh_cached(table_name, dataset).await;

        Ok(IndexOutcome::Built(IndexStats {
            column: VECTOR_COLUMN.to_string(),
            index_type: "ivf_hnsw".to_string(),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }))
    }

    /// Create an IVF_FLAT index (compact, scales to large tables).
    pub async fn create_ivf_flat_index(
        &self,
        table_name: &str,
    ) -> Result<IndexOutcome, RetrievalError> {
        let mut dataset = self.open_table(table_name).await?;
        let num_rows = dataset.count_rows(None).await?;
        if num_rows < VECTOR_INDEX_ROW_FLOOR {
            return Ok(IndexOutcome::Skipped {
                reason: format!(
                    "{num_rows} rows is below the {VECTOR_INDEX_ROW_FLOOR}-row index floor"
                ),
            });
        }

        let num_partitions = (num_rows / 256).clamp(32, 512);
        let params = VectorIndexParams::ivf_flat(num_partitions, DistanceType::L2);

        let start = Instant::now();
        dataset
            .create_index(&[VECTOR_COLUMN], IndexType::Vector, None, &params, true)
            .await?;
        self.refresh_cached(table_name, dataset).await;

        Ok(IndexOutcome::Built(IndexStats {
            column: VECTOR_COLUMN.to_string(),
            index_type: "ivf_flat".to_string(),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        }))
    }

    /// Pick and build the best vector index for the table size: skipped
    /// below 100 rows, IVF+HNSW below 10k, IVF_FLAT at or above.
    pub async fn create_optimal_vector_index(
        &self,
        table_name: &str,
    ) -> Result<IndexOutcome, RetrievalError> {
        let count = self.count(table_name).await? as usize;
        if count < VECTOR_INDEX_ROW_FLOOR {
            return Ok(IndexOutcome::Skipped {
                reason: format!(
                    "{count} rows is below the {VECTOR_INDEX_ROW_FLOOR}-row index floor"
                ),
            });
        }
        if count < HNSW_ROW_THRESHOLD {
            self.create_hnsw_index(table_name).await
        } else {
            self.create_ivf_flat_index(table_name).await
        }
    }
}

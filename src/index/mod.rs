//! Index lifecycle: scalar (BTree/Bitmap), vector (IVF_FLAT/IVF+HNSW) and
//! full-text (inverted) indices, with size-aware selection.

use std::sync::Arc;

use lance_index::traits::DatasetIndexExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::RetrievalError;
use crate::RetrievalStore;

pub mod fts;
pub mod scalar;
pub mod vector;

/// Statistics from a completed index build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Indexed column.
    pub column: String,
    /// Index flavor (`btree`, `bitmap`, `ivf_hnsw`, `ivf_flat`, `inverted`).
    pub index_type: String,
    /// Wall-clock build time in milliseconds.
    pub duration_ms: u64,
}

/// Result of an index build request. Tables below the build floor report a
/// no-op rather than an error, so maintenance loops stay unconditional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum IndexOutcome {
    /// Index was (re)built.
    Built(IndexStats),
    /// Build was skipped.
    Skipped {
        /// Why the build did not run.
        reason: String,
    },
}

impl IndexOutcome {
    /// True when an index was actually built.
    #[must_use]
    pub fn is_built(&self) -> bool {
        matches!(self, IndexOutcome::Built(_))
    }
}

impl RetrievalStore {
    /// List index descriptions for the table (empty if the table is missing
    /// or unindexed).
    pub(crate) async fn describe_indices(
        &self,
        table_name: &str,
    ) -> Result<Vec<Arc<dyn lance_index::IndexDescription>>, RetrievalError> {
        if !self.table_path(table_name).exists() {
            return Ok(Vec::new());
        }
        let dataset = self.open_table(table_name).await?;
        Ok(dataset.describe_indices(None).await?)
    }

    /// Whether the table has any vector index.
    pub async fn has_vector_index(&self, table_name: &str) -> Result<bool, RetrievalError> {
        let indices = self.describe_indices(table_name).await?;
        let is_vector_type = |t: &str| {
            t.contains("Vector") || t.contains("IVF") || t.eq_ignore_ascii_case("flat")
        };
        Ok(indices
            .iter()
            .any(|d| d.name() == "vector_idx" || is_vector_type(d.index_type())))
    }

    /// Whether the table has an inverted (FTS) index on `content`.
    pub async fn has_fts_index(&self, table_name: &str) -> Result<bool, RetrievalError> {
        let indices = self.describe_indices(table_name).await?;
        Ok(indices
            .iter()
            .any(|d| d.index_type() == "Inverted" || d.name() == "content_fts"))
    }

    /// Whether the table has a scalar index on `skill_name` or `category`.
    pub async fn has_scalar_index(&self, table_name: &str) -> Result<bool, RetrievalError> {
        let indices = self.describe_indices(table_name).await?;
        Ok(indices.iter().any(|d| {
            let t = d.index_type();
            (t == "BTree" || t == "Bitmap")
                && (d.name().contains("skill_name") || d.name().contains("category"))
        }))
    }

    /// Kick off an optimal vector index build on a background task. The
    /// caller may await the handle or drop it; the build runs either way.
    #[must_use]
    pub fn create_index_background(
        &self,
        table_name: &str,
    ) -> JoinHandle<Result<IndexOutcome, RetrievalError>> {
        let store = self.clone();
        let table = table_name.to_string();
        tokio::spawn(async move {
            let outcome = store.create_optimal_vector_index(&table).await?;
            if let IndexOutcome::Built(stats) = &outcome {
                log::info!(
                    "background index build for '{table}' finished: {} in {}ms",
                    stats.index_type,
                    stats.duration_ms
                );
            }
            Ok(outcome)
        })
    }
}

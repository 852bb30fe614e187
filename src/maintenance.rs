//! Maintenance operations: automatic index creation once a table is large
//! enough, and compaction to keep fragment counts down.

use std::time::Instant;

use chrono::Duration as ChronoDuration;
use lance::dataset::optimize::{compact_files, CompactionOptions};
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;
use crate::schema::{CATEGORY_COLUMN, SKILL_NAME_COLUMN};
use crate::{IndexOutcome, IndexStats, RetrievalStore};

/// Thresholds for automatic index creation and maintenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexThresholds {
    /// Create indexes when the table reaches this many rows.
    pub auto_index_at: usize,
    /// Maximum acceptable fragmentation (fragments / rows).
    pub max_fragmentation_ratio: f64,
}

impl Default for IndexThresholds {
    fn default() -> Self {
        Self {
            auto_index_at: 100,
            max_fragmentation_ratio: 0.01,
        }
    }
}

/// Statistics returned after compaction (version cleanup + file compaction).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompactionStats {
    /// Fragment count before compaction.
    pub fragments_before: usize,
    /// Fragment count after compaction.
    pub fragments_after: usize,
    /// Fragments merged/removed by compaction.
    pub fragments_removed: usize,
    /// Bytes freed by cleanup of old versions and unreferenced files.
    pub bytes_freed: u64,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl RetrievalStore {
    /// Create indexes if the table meets the default thresholds (vector,
    /// FTS, scalar on skill_name/category). Best-effort: per-index
    /// failures are logged and the remaining builds still run.
    pub async fn auto_index_if_needed(
        &self,
        table_name: &str,
    ) -> Result<Option<IndexStats>, RetrievalError> {
        self.auto_index_if_needed_with_thresholds(table_name, &IndexThresholds::default())
            .await
    }

    /// Like [`Self::auto_index_if_needed`] with custom thresholds.
    pub async fn auto_index_if_needed_with_thresholds(
        &self,
        table_name: &str,
        thresholds: &IndexThresholds,
    ) -> Result<Option<IndexStats>, RetrievalError> {
        let count = self.count(table_name).await? as usize;
        if count < thresholds.auto_index_at {
            return Ok(None);
        }

        let mut last_stats: Option<IndexStats> = None;
        let mut note_outcome = |outcome: IndexOutcome| {
            if let IndexOutcome::Built(stats) = outcome {
                last_stats = Some(stats);
            }
        };

        if !self.has_vector_index(table_name).await? {
            match self.create_optimal_vector_index(table_name).await {
                Ok(outcome) => note_outcome(outcome),
                Err(e) => log::warn!("auto_index: create vector index failed: {e}"),
            }
        }

        if !self.has_fts_index(table_name).await? {
            match self.create_fts_index(table_name).await {
                Ok(outcome) => note_outcome(outcome),
                Err(e) => log::warn!("auto_index: create FTS index failed: {e}"),
            }
        }

        if !self.has_scalar_index(table_name).await? {
            match self.create_btree_index(table_name, SKILL_NAME_COLUMN).await {
                Ok(outcome) => note_outcome(outcome),
                Err(e) => {
                    log::warn!("auto_index: create btree index on {SKILL_NAME_COLUMN} failed: {e}");
                }
            }
            match self.create_bitmap_index(table_name, CATEGORY_COLUMN).await {
                Ok(outcome) => note_outcome(outcome),
                Err(e) => {
                    log::warn!("auto_index: create bitmap index on {CATEGORY_COLUMN} failed: {e}");
                }
            }
        }

        Ok(last_stats)
    }

    /// Clean up versions older than seven days and compact small fragments.
    pub async fn compact(&self, table_name: &str) -> Result<CompactionStats, RetrievalError> {
        let start = Instant::now();
        let mut dataset = self.open_table(table_name).await?;

        let fragments_before = dataset.get_fragments().len();

        let bytes_freed = dataset
            .cleanup_old_versions(ChronoDuration::days(7), None, None)
            .await
            .map(|s| s.bytes_removed)?;

        let opts = CompactionOptions {
            target_rows_per_fragment: 256 * 1024,
            max_rows_per_group: 1024,
            ..Default::default()
        };
        let metrics = compact_files(&mut dataset, opts, None).await?;

        let fragments_after = dataset.get_fragments().len();
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.refresh_cached(table_name, dataset).await;

        Ok(CompactionStats {
            fragments_before,
            fragments_after,
            fragments_removed: metrics.fragments_removed,
            bytes_freed,
            duration_ms,
        })
    }
}

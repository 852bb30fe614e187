//! Observability: table health analysis, partitioning advice, and
//! in-process query metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;
use crate::schema::{CATEGORY_COLUMN, SKILL_NAME_COLUMN};
use crate::RetrievalStore;

/// Fragmentation ratio above which compaction is recommended.
const FRAGMENTATION_RATIO_THRESHOLD: f64 = 0.01;
/// Row count above which missing indices are flagged.
const ROW_COUNT_INDEX_THRESHOLD: u64 = 1000;
/// Row count above which partitioning is suggested (advisory).
const PARTITION_SUGGEST_ROW_THRESHOLD: u64 = 10_000;

/// Summary of one index for health reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    /// Index name (e.g. `"vector_idx"`, `"content_fts"`).
    pub name: String,
    /// Index kind (e.g. `"IVF_FLAT"`, `"Inverted"`, `"BTree"`).
    pub index_type: String,
}

/// Suggested action from [`RetrievalStore::analyze_table_health`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Run compaction to reduce fragmentation.
    RunCompaction,
    /// Create missing vector/FTS/scalar indices.
    CreateIndices,
    /// Partition the table by the given column.
    Partition {
        /// Column name to partition by.
        column: String,
    },
    /// No action needed.
    None,
}

/// Per-table query metrics, updated by [`RetrievalStore::search`].
/// In-process only; counts reset with the store instance.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueryMetrics {
    /// Number of search calls for this table since the store opened.
    pub query_count: u64,
    /// Last query latency in milliseconds.
    pub last_query_ms: Option<u64>,
}

/// Table health report from [`RetrievalStore::analyze_table_health`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableHealthReport {
    /// Total row count.
    pub row_count: u64,
    /// Number of fragments.
    pub fragment_count: usize,
    /// Fragment count / row count (high values suggest compaction).
    pub fragmentation_ratio: f64,
    /// Existing indices on the table.
    pub indices_status: Vec<IndexStatus>,
    /// Suggested actions, in priority order.
    pub recommendations: Vec<Recommendation>,
}

impl RetrievalStore {
    /// Analyze table health and return a report with recommendations.
    pub async fn analyze_table_health(
        &self,
        table_name: &str,
    ) -> Result<TableHealthReport, RetrievalError> {
        let row_count = self.count(table_name).await?;
        let fragments = self.get_fragment_stats(table_name).await?;
        let fragment_count = fragments.len();
        let fragmentation_ratio = if row_count > 0 {
            fragment_count as f64 / row_count as f64
        } else {
            0.0
        };

        let indices = self.describe_indices(table_name).await?;
        let indices_status: Vec<IndexStatus> = indices
            .iter()
            .map(|d| IndexStatus {
                name: d.name().to_string(),
                index_type: d.index_type().to_string(),
            })
            .collect();

        let has_vector = self.has_vector_index(table_name).await?;
        let has_fts = self.has_fts_index(table_name).await?;
        let has_scalar = self.has_scalar_index(table_name).await?;
        let needs_indices =
            row_count >= ROW_COUNT_INDEX_THRESHOLD && (!has_vector || !has_fts || !has_scalar);

        let mut recommendations = Vec::new();
        if fragmentation_ratio > FRAGMENTATION_RATIO_THRESHOLD {
            recommendations.push(Recommendation::RunCompaction);
        }
        if needs_indices {
            recommendations.push(Recommendation::CreateIndices);
        }
        if let Some(column) = self.suggest_partition_column(table_name).await? {
            recommendations.push(Recommendation::Partition { column });
        }
        if recommendations.is_empty() {
            recommendations.push(Recommendation::None);
        }

        Ok(TableHealthReport {
            row_count,
            fragment_count,
            fragmentation_ratio,
            indices_status,
            recommendations,
        })
    }

    /// Suggests a column to partition the table by, if the table is large
    /// and has a partition-friendly column. Among the candidate columns
    /// present, the one with the fewest distinct values wins: coarse groups
    /// make fragment pruning effective. Returns `None` when the table is
    /// missing, too small, or has no such column.
    pub async fn suggest_partition_column(
        &self,
        table_name: &str,
    ) -> Result<Option<String>, RetrievalError> {
        if !self.table_path(table_name).exists() {
            return Ok(None);
        }
        let row_count = self.count(table_name).await?;
        if row_count < PARTITION_SUGGEST_ROW_THRESHOLD {
            return Ok(None);
        }
        let dataset = self.open_table(table_name).await?;
        let schema = dataset.schema();

        let mut best: Option<(usize, String)> = None;
        for column in [CATEGORY_COLUMN, SKILL_NAME_COLUMN] {
            if schema.field(column).is_none() {
                continue;
            }
            let cardinality = self.estimate_cardinality(table_name, column).await?;
            if cardinality == 0 {
                continue;
            }
            if best.as_ref().map_or(true, |(c, _)| cardinality < *c) {
                best = Some((cardinality, column.to_string()));
            }
        }
        Ok(best.map(|(_, column)| column))
    }

    /// Record a query against the table (in-process metrics).
    pub(crate) fn record_query(&self, table_name: &str, elapsed_ms: u64) {
        let cell = self
            .metrics_map()
            .entry(table_name.to_string())
            .or_insert_with(|| Arc::new((AtomicU64::new(0), AtomicU64::new(0))));
        cell.0.fetch_add(1, Ordering::Relaxed);
        cell.1.store(elapsed_ms, Ordering::Relaxed);
    }

    /// Return per-table query metrics.
    pub fn get_query_metrics(&self, table_name: &str) -> QueryMetrics {
        if let Some(cell) = self.metrics_map().get(table_name) {
            let count = cell.0.load(Ordering::Relaxed);
            let last_ms = cell.1.load(Ordering::Relaxed);
            QueryMetrics {
                query_count: count,
                // A sub-millisecond query legitimately records 0ms; "never
                // recorded" is the zero-count case.
                last_query_ms: (count > 0).then_some(last_ms),
            }
        } else {
            QueryMetrics::default()
        }
    }
}

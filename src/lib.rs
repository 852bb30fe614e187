//! lodestone - Embedded hybrid retrieval engine over Lance.
//!
//! Ranks and returns items (tool/command descriptors or knowledge passages)
//! from Lance columnar tables, combining dense vector search, Tantivy BM25
//! keyword search, weighted Reciprocal Rank Fusion with field boosting, and
//! an intent-driven strategy selector.
//!
//! ```text
//! lodestone/src/
//! ├── lib.rs           # RetrievalStore and handle acquisition
//! ├── error.rs         # RetrievalError taxonomy
//! ├── schema.rs        # versioned table schema + legacy column readers
//! ├── record.rs        # row records and normalization
//! ├── cache.rs         # bounded LRU dataset-handle pool
//! ├── writer.rs        # append / partition-aware writes
//! ├── migration.rs     # streaming schema rewrite with temp-table swap
//! ├── admin.rs         # counts, drops, column evolution
//! ├── index/           # scalar, vector, and FTS index lifecycle
//! ├── keyword/         # Tantivy BM25 index + RRF fusion
//! ├── search/          # vector, hybrid, intent routing, calibration
//! ├── maintenance.rs   # auto-indexing and compaction
//! └── observability.rs # health reports and query metrics
//! ```

use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use dashmap::DashMap;
use lance::dataset::{Dataset, WriteParams};
use lance::deps::arrow_array::{RecordBatch, RecordBatchIterator};
use tokio::sync::Mutex;

pub mod admin;
pub mod cache;
pub mod error;
pub mod index;
pub mod keyword;
pub mod maintenance;
pub mod migration;
pub mod observability;
pub mod record;
pub mod schema;
pub mod search;
pub mod writer;

pub use admin::{
    FragmentInfo, TableColumnAlteration, TableColumnType, TableInfo, TableNewColumn,
    TableVersionInfo,
};
pub use cache::{CacheConfig, DatasetCache};
pub use error::RetrievalError;
pub use index::{IndexOutcome, IndexStats};
pub use keyword::{HybridHit, KeywordDoc, KeywordHit, KeywordIndex};
pub use maintenance::{CompactionStats, IndexThresholds};
pub use migration::{MigrationReport, PendingMigration};
pub use observability::{IndexStatus, QueryMetrics, Recommendation, TableHealthReport};
pub use record::Record;
pub use schema::{
    CATEGORY_COLUMN, CONTENT_COLUMN, CURRENT_SCHEMA_VERSION, DEFAULT_DIMENSION, FILE_PATH_COLUMN,
    ID_COLUMN, INTENTS_COLUMN, METADATA_COLUMN, ROUTING_KEYWORDS_COLUMN, SKILL_NAME_COLUMN,
    TOOL_NAME_COLUMN, VECTOR_COLUMN,
};
pub use search::{
    CalibrationBand, CalibrationProfile, Confidence, IntentClassifier, QueryIntent,
    RuleIntentClassifier, SearchConfig, SearchHit, SearchOptions,
};

type MetricsCell = Arc<(AtomicU64, AtomicU64)>;

/// Store-level configuration, fixed at open time.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Embedding dimension for all tables in this store.
    pub dimension: usize,
    /// Dataset-handle cache capacity; `None` is unbounded.
    pub max_cached_tables: Option<usize>,
    /// Whether to open the Tantivy keyword index alongside the store.
    pub enable_keyword_index: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            max_cached_tables: None,
            enable_keyword_index: true,
        }
    }
}

/// Embedded retrieval store over Lance tables.
///
/// Cloning is cheap; clones share the dataset cache, keyword index, and
/// query metrics.
#[derive(Clone)]
pub struct RetrievalStore {
    base_path: PathBuf,
    /// Shared dataset-handle pool; the mutex covers the create-or-fetch step
    /// so concurrent acquires for the same table are single-flight.
    datasets: Arc<Mutex<DatasetCache>>,
    dimension: usize,
    keyword_index: Option<Arc<KeywordIndex>>,
    /// Per-table (query_count, last_latency_ms); in-process, reset with the store.
    query_metrics: Arc<DashMap<String, MetricsCell>>,
    intent_classifier: Option<Arc<dyn IntentClassifier>>,
    calibration: Arc<CalibrationProfile>,
}

impl RetrievalStore {
    /// Open (or create) a store rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base directory or keyword index cannot be
    /// created.
    pub async fn open(path: &str, config: StoreConfig) -> Result<Self, RetrievalError> {
        let base_path = PathBuf::from(path);
        if let Some(parent) = base_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        if !base_path.exists() {
            std::fs::create_dir_all(&base_path)?;
        }

        let keyword_index = if config.enable_keyword_index {
            Some(Arc::new(KeywordIndex::open(&base_path)?))
        } else {
            None
        };

        Ok(Self {
            base_path,
            datasets: Arc::new(Mutex::new(DatasetCache::new(CacheConfig {
                max_cached_tables: config.max_cached_tables,
            }))),
            dimension: config.dimension,
            keyword_index,
            query_metrics: Arc::new(DashMap::new()),
            intent_classifier: None,
            calibration: Arc::new(CalibrationProfile::default()),
        })
    }

    /// Replace the intent classifier (rule-based is used when none is set).
    #[must_use]
    pub fn with_intent_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.intent_classifier = Some(classifier);
        self
    }

    /// Replace the confidence-calibration profile.
    #[must_use]
    pub fn with_calibration(mut self, profile: CalibrationProfile) -> Self {
        self.calibration = Arc::new(profile);
        self
    }

    /// Embedding dimension configured for this store.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Keyword index handle, when enabled.
    #[must_use]
    pub fn keyword_index(&self) -> Option<&Arc<KeywordIndex>> {
        self.keyword_index.as_ref()
    }

    pub(crate) fn calibration(&self) -> &CalibrationProfile {
        self.calibration.as_ref()
    }

    pub(crate) fn intent_classifier(&self) -> Option<&Arc<dyn IntentClassifier>> {
        self.intent_classifier.as_ref()
    }

    pub(crate) fn metrics_map(&self) -> &DashMap<String, MetricsCell> {
        self.query_metrics.as_ref()
    }

    /// Filesystem path for a table.
    #[must_use]
    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.base_path.join(format!("{table_name}.lance"))
    }

    pub(crate) fn base_path(&self) -> &std::path::Path {
        &self.base_path
    }

    /// True when the directory holds an initialized Lance dataset, not just
    /// an empty directory left behind by a failed create.
    pub(crate) fn has_lance_data(path: &std::path::Path) -> bool {
        path.exists() && (path.join("_versions").exists() || path.join("data").exists())
    }

    /// Open a table for reading through the cache; errors if it doesn't exist.
    pub(crate) async fn open_table(&self, table_name: &str) -> Result<Dataset, RetrievalError> {
        let table_path = self.table_path(table_name);
        let mut cache = self.datasets.lock().await;
        if let Some(cached) = cache.get(table_name) {
            if table_path.exists() {
                return Ok(cached);
            }
            cache.remove(table_name);
        }
        if !Self::has_lance_data(&table_path) {
            return Err(RetrievalError::TableNotFound(table_name.to_string()));
        }
        let dataset = Dataset::open(table_path.to_string_lossy().as_ref()).await?;
        cache.insert(table_name.to_string(), dataset.clone());
        Ok(dataset)
    }

    /// Acquire a table handle, creating an empty table if absent.
    ///
    /// The cache mutex is held across the open/create await so concurrent
    /// acquires for the same table cannot race-create duplicate handles.
    pub(crate) async fn get_or_create_dataset(
        &self,
        table_name: &str,
    ) -> Result<Dataset, RetrievalError> {
        let table_path = self.table_path(table_name);
        let uri = table_path.to_string_lossy().into_owned();

        let mut cache = self.datasets.lock().await;
        if let Some(cached) = cache.get(table_name) {
            if table_path.exists() {
                return Ok(cached);
            }
            cache.remove(table_name);
        }

        let dataset = if Self::has_lance_data(&table_path) {
            Dataset::open(uri.as_str()).await?
        } else {
            if table_path.exists() {
                // Leftover empty directory from an interrupted create.
                std::fs::remove_dir_all(&table_path)?;
            }
            let arrow_schema = schema::table_schema(self.dimension);
            log::info!(
                "creating table '{table_name}' at {uri} with dimension {}",
                self.dimension
            );
            let batches: Vec<Result<RecordBatch, error::ArrowError>> =
                vec![Ok(RecordBatch::new_empty(arrow_schema.clone()))];
            Dataset::write(
                Box::new(RecordBatchIterator::new(batches, arrow_schema)),
                uri.as_str(),
                Some(WriteParams::default()),
            )
            .await?
        };

        cache.insert(table_name.to_string(), dataset.clone());
        Ok(dataset)
    }

    /// Swap the cached handle after a structural write (append, migration).
    pub(crate) async fn refresh_cached(&self, table_name: &str, dataset: Dataset) {
        let mut cache = self.datasets.lock().await;
        cache.insert(table_name.to_string(), dataset);
    }

    /// Drop a table's cache entry (post-drop or post-rewrite).
    pub(crate) async fn invalidate_cached(&self, table_name: &str) {
        let mut cache = self.datasets.lock().await;
        cache.remove(table_name);
    }

    /// Lock the dataset cache; structural rewrites hold this across their
    /// filesystem swap.
    pub(crate) async fn datasets_mut(&self) -> tokio::sync::MutexGuard<'_, DatasetCache> {
        self.datasets.lock().await
    }
}

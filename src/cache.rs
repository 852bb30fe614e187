//! Bounded LRU pool of open Lance `Dataset` handles (connection-pool style).

use std::collections::{HashMap, VecDeque};

use lance::dataset::Dataset;

/// Configuration for the dataset cache.
#[derive(Clone, Copy, Debug, Default)]
pub struct CacheConfig {
    /// Max tables to keep open; least-recently-used is evicted when exceeded.
    /// `None` means unbounded (never evicts).
    pub max_cached_tables: Option<usize>,
}

/// Cache of table name -> `Dataset` with strict LRU eviction at capacity.
///
/// Eviction only drops the pooled handle; callers that already cloned a
/// `Dataset` out of the cache keep a live handle and are unaffected.
pub struct DatasetCache {
    entries: HashMap<String, Dataset>,
    /// Keys in order of last use (front = oldest). Maintained even when
    /// unbounded so a later capacity change behaves predictably.
    lru_order: VecDeque<String>,
    max_size: Option<usize>,
}

impl DatasetCache {
    /// Create a new cache with the given config.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            lru_order: VecDeque::new(),
            max_size: config.max_cached_tables,
        }
    }

    /// Get a clone of the dataset if present and bump it to most recently used.
    pub fn get(&mut self, key: &str) -> Option<Dataset> {
        let out = self.entries.get(key).cloned()?;
        self.bump_lru(key);
        Some(out)
    }

    /// Insert or replace; evict oldest entries first if at capacity.
    pub fn insert(&mut self, key: String, value: Dataset) {
        if !self.entries.contains_key(&key) {
            self.evict_until_under_capacity(1);
        }
        self.lru_order.retain(|k| k != &key);
        self.lru_order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    /// Remove and return the dataset for the key.
    pub fn remove(&mut self, key: &str) -> Option<Dataset> {
        self.lru_order.retain(|k| k != key);
        self.entries.remove(key)
    }

    /// Number of datasets currently in the cache.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the cache has an entry for the key.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn bump_lru(&mut self, key: &str) {
        self.lru_order.retain(|k| k != key);
        self.lru_order.push_back(key.to_string());
    }

    /// Evict from front of `lru_order` until `len + reserve <= max_size`.
    fn evict_until_under_capacity(&mut self, reserve: usize) {
        let Some(max) = self.max_size else {
            return;
        };
        while self.entries.len() + reserve > max {
            let Some(old) = self.lru_order.pop_front() else {
                break;
            };
            self.entries.remove(&old);
            log::debug!("dataset cache: evicted '{old}'");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lance::deps::arrow_array::{RecordBatch, RecordBatchIterator, StringArray};
    use lance::deps::arrow_schema::{DataType, Field, Schema};

    use super::*;

    async fn dataset_at(dir: &std::path::Path, name: &str) -> Dataset {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Utf8, false)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(StringArray::from(vec![name]))],
        )
        .unwrap();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
        let uri = dir.join(format!("{name}.lance"));
        let params = lance::dataset::WriteParams {
            mode: lance::dataset::WriteMode::Overwrite,
            ..Default::default()
        };
        Dataset::write(Box::new(reader), uri.to_str().unwrap(), Some(params))
            .await
            .unwrap()
    }

    fn bounded(max: usize) -> DatasetCache {
        DatasetCache::new(CacheConfig {
            max_cached_tables: Some(max),
        })
    }

    #[tokio::test]
    async fn evicts_least_recently_used_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = bounded(2);
        cache.insert("a".to_string(), dataset_at(dir.path(), "a").await);
        cache.insert("b".to_string(), dataset_at(dir.path(), "b").await);

        // Touch "a" so "b" becomes the oldest.
        assert!(cache.get("a").is_some());
        cache.insert("c".to_string(), dataset_at(dir.path(), "c").await);

        assert_eq!(cache.len(), 2);
        assert!(cache.contains_key("a"));
        assert!(!cache.contains_key("b"));
        assert!(cache.contains_key("c"));
    }

    #[tokio::test]
    async fn reinserting_a_cached_key_does_not_evict() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = bounded(2);
        cache.insert("a".to_string(), dataset_at(dir.path(), "a").await);
        cache.insert("b".to_string(), dataset_at(dir.path(), "b").await);
        cache.insert("a".to_string(), dataset_at(dir.path(), "a").await);

        assert_eq!(cache.len(), 2);
        assert!(cache.contains_key("a"));
        assert!(cache.contains_key("b"));
    }

    #[tokio::test]
    async fn unbounded_cache_never_evicts() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = DatasetCache::new(CacheConfig::default());
        for name in ["a", "b", "c", "d"] {
            cache.insert(name.to_string(), dataset_at(dir.path(), name).await);
        }
        assert_eq!(cache.len(), 4);
    }

    #[tokio::test]
    async fn remove_drops_the_entry_and_its_lru_slot() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = bounded(2);
        cache.insert("a".to_string(), dataset_at(dir.path(), "a").await);
        assert!(cache.remove("a").is_some());
        assert!(cache.is_empty());
        assert!(cache.remove("a").is_none());
    }
}

//! Tests for scalar index creation: BTree, Bitmap, and cardinality-based
//! selection.

use lodestone::{Record, RetrievalError, RetrievalStore, StoreConfig};

fn config(dim: usize) -> StoreConfig {
    StoreConfig {
        dimension: dim,
        enable_keyword_index: false,
        ..StoreConfig::default()
    }
}

async fn add_tools(store: &RetrievalStore, table: &str, n: usize, categories: usize) {
    let records: Vec<Record> = (0..n)
        .map(|i| Record {
            id: format!("skill.cmd_{i}"),
            content: format!("content {i}"),
            vector: Some(vec![i as f32 * 0.01; 8]),
            skill_name: format!("skill_{}", i % 7),
            category: format!("cat_{}", i % categories.max(1)),
            tool_name: format!("skill.cmd_{i}"),
            ..Record::default()
        })
        .collect();
    store.append(table, records).await.unwrap();
}

#[tokio::test]
async fn test_create_btree_index_returns_stats() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(8))
        .await
        .unwrap();
    add_tools(&store, "t", 120, 3).await;

    let outcome = store.create_btree_index("t", "skill_name").await.unwrap();
    assert!(outcome.is_built());
}

#[tokio::test]
async fn test_create_bitmap_index_returns_stats() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(8))
        .await
        .unwrap();
    add_tools(&store, "t", 120, 3).await;

    let outcome = store.create_bitmap_index("t", "category").await.unwrap();
    assert!(outcome.is_built());
}

#[tokio::test]
async fn test_scalar_index_on_empty_table_is_skipped() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(8))
        .await
        .unwrap();
    add_tools(&store, "t", 1, 1).await;
    store.delete("t", &["skill.cmd_0".to_string()]).await.unwrap();

    let outcome = store.create_btree_index("t", "skill_name").await.unwrap();
    assert!(!outcome.is_built());
}

#[tokio::test]
async fn test_optimal_scalar_index_low_cardinality_uses_bitmap() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(8))
        .await
        .unwrap();
    add_tools(&store, "t", 150, 4).await;

    store
        .create_optimal_scalar_index("t", "category")
        .await
        .unwrap();
    assert!(store.has_scalar_index("t").await.unwrap());
}

#[tokio::test]
async fn test_estimate_cardinality_unknown_column() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(8))
        .await
        .unwrap();
    add_tools(&store, "t", 10, 2).await;

    let err = store
        .create_optimal_scalar_index("t", "no_such_column")
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::ColumnNotFound { .. }));
}

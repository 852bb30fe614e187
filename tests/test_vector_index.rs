//! Tests for vector index creation: HNSW floor, size-based selection.

use lodestone::{IndexOutcome, Record, RetrievalStore, StoreConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn config(dim: usize) -> StoreConfig {
    StoreConfig {
        dimension: dim,
        enable_keyword_index: false,
        ..StoreConfig::default()
    }
}

async fn add_tools(store: &RetrievalStore, table: &str, n: usize, dim: usize) {
    let records: Vec<Record> = (0..n)
        .map(|i| {
            let mut vector = vec![0.0f32; dim];
            vector[i % dim] = 1.0 + (i as f32) * 0.01;
            Record {
                id: format!("skill.cmd_{i}"),
                content: format!("content {i}"),
                vector: Some(vector),
                skill_name: "skill".to_string(),
                category: "test".to_string(),
                tool_name: format!("skill.cmd_{i}"),
                ..Record::default()
            }
        })
        .collect();
    store.append(table, records).await.unwrap();
}

#[tokio::test]
async fn test_create_hnsw_index_returns_stats() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(16))
        .await
        .unwrap();
    add_tools(&store, "t", 100, 16).await;

    let outcome = store.create_hnsw_index("t").await.unwrap();
    match outcome {
        IndexOutcome::Built(stats) => {
            assert_eq!(stats.column, "vector");
            assert_eq!(stats.index_type, "ivf_hnsw");
            assert!(stats.duration_ms <= 60_000);
        }
        IndexOutcome::Skipped { reason } => panic!("unexpected skip: {reason}"),
    }
    assert!(store.has_vector_index("t").await.unwrap());
}

#[tokio::test]
async fn test_create_hnsw_index_skips_below_floor() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(16))
        .await
        .unwrap();
    add_tools(&store, "t", 40, 16).await;

    let outcome = store.create_hnsw_index("t").await.unwrap();
    assert!(!outcome.is_built());
}

#[tokio::test]
async fn test_optimal_index_builds_hnsw_at_exactly_the_row_floor() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(16))
        .await
        .unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let records: Vec<Record> = (0..100)
        .map(|i| Record {
            id: format!("skill.cmd_{i}"),
            content: format!("content {i}"),
            vector: Some((0..16).map(|_| rng.gen::<f32>()).collect()),
            skill_name: "skill".to_string(),
            category: "test".to_string(),
            tool_name: format!("skill.cmd_{i}"),
            ..Record::default()
        })
        .collect();
    store.append("t", records).await.unwrap();

    let outcome = store.create_optimal_vector_index("t").await.unwrap();
    match outcome {
        IndexOutcome::Built(stats) => assert_eq!(stats.index_type, "ivf_hnsw"),
        IndexOutcome::Skipped { reason } => panic!("unexpected skip: {reason}"),
    }
}

#[tokio::test]
async fn test_create_optimal_vector_index_small_uses_hnsw() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(16))
        .await
        .unwrap();
    add_tools(&store, "t", 300, 16).await;

    let outcome = store.create_optimal_vector_index("t").await.unwrap();
    match outcome {
        IndexOutcome::Built(stats) => assert_eq!(stats.index_type, "ivf_hnsw"),
        IndexOutcome::Skipped { reason } => panic!("unexpected skip: {reason}"),
    }
}

#[tokio::test]
async fn test_create_optimal_vector_index_skips_tiny_tables() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(16))
        .await
        .unwrap();
    add_tools(&store, "t", 20, 16).await;

    let outcome = store.create_optimal_vector_index("t").await.unwrap();
    assert!(!outcome.is_built());
    assert!(!store.has_vector_index("t").await.unwrap());
}

#[tokio::test]
async fn test_search_still_works_after_index_build() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(16))
        .await
        .unwrap();
    add_tools(&store, "t", 120, 16).await;
    store.create_hnsw_index("t").await.unwrap();

    let mut query = vec![0.0f32; 16];
    query[0] = 1.0;
    let hits = store
        .vector_search("t", query, 5, lodestone::SearchOptions::default())
        .await
        .unwrap();
    assert!(!hits.is_empty());
}

#[tokio::test]
async fn test_background_index_build_completes() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(16))
        .await
        .unwrap();
    add_tools(&store, "t", 150, 16).await;

    let handle = store.create_index_background("t");
    let outcome = handle.await.unwrap().unwrap();
    assert!(outcome.is_built());
    assert!(store.has_vector_index("t").await.unwrap());
}

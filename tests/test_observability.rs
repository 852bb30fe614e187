//! Tests for observability: health reports, recommendations, query metrics.

use lodestone::{Record, Recommendation, RetrievalStore, SearchConfig, StoreConfig};

fn config(dim: usize) -> StoreConfig {
    StoreConfig {
        dimension: dim,
        ..StoreConfig::default()
    }
}

async fn add_tools(store: &RetrievalStore, table: &str, n: usize, dim: usize) {
    let records: Vec<Record> = (0..n)
        .map(|i| {
            let mut vector = vec![0.0f32; dim];
            vector[i % dim] = 1.0;
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
async fn test_analyze_table_health_returns_report() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(8))
        .await
        .unwrap();
    add_tools(&store, "t", 50, 8).await;

    let report = store.analyze_table_health("t").await.unwrap();

    assert_eq!(report.row_count, 50);
    assert!(report.fragment_count >= 1);
    assert!(report.fragmentation_ratio >= 0.0);
    assert!(!report.recommendations.is_empty());
}

#[tokio::test]
async fn test_health_recommends_create_indices_when_missing() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(8))
        .await
        .unwrap();
    add_tools(&store, "t", 1200, 8).await;

    let report = store.analyze_table_health("t").await.unwrap();
    assert!(report
        .recommendations
        .contains(&Recommendation::CreateIndices));
}

#[tokio::test]
async fn test_health_lists_existing_indices() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(8))
        .await
        .unwrap();
    add_tools(&store, "t", 120, 8).await;
    store.create_hnsw_index("t").await.unwrap();

    let report = store.analyze_table_health("t").await.unwrap();
    assert!(!report.indices_status.is_empty());
}

#[tokio::test]
async fn test_query_metrics_track_search_calls() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(8))
        .await
        .unwrap();
    add_tools(&store, "t", 10, 8).await;

    assert_eq!(store.get_query_metrics("t").query_count, 0);

    let mut query = vec![0.0f32; 8];
    query[0] = 1.0;
    store
        .search(
            "t",
            &query,
            Some("cmd"),
            SearchConfig {
                threshold: 0.0,
                ..SearchConfig::default()
            },
        )
        .await
        .unwrap();
    store
        .search("t", &query, None, SearchConfig::default())
        .await
        .unwrap();

    let metrics = store.get_query_metrics("t");
    assert_eq!(metrics.query_count, 2);
    // Tiny tables answer in under a millisecond; the latency must still
    // read as recorded.
    assert!(metrics.last_query_ms.is_some());
}

#[tokio::test]
async fn test_suggest_partition_column_prefers_coarser_column() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(4))
        .await
        .unwrap();

    // Many skills, one category: the coarser column makes better
    // partitions.
    let records: Vec<Record> = (0..10_000)
        .map(|i| Record {
            id: format!("skill{i}.cmd"),
            content: "content".to_string(),
            vector: Some(vec![0.1; 4]),
            skill_name: format!("skill{}", i % 500),
            category: "tools".to_string(),
            tool_name: format!("skill{i}.cmd"),
            ..Record::default()
        })
        .collect();
    store.append("t", records).await.unwrap();

    let suggested = store.suggest_partition_column("t").await.unwrap();
    assert_eq!(suggested.as_deref(), Some("category"));
}

#[tokio::test]
async fn test_suggest_partition_column_small_tables() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(8))
        .await
        .unwrap();
    add_tools(&store, "t", 50, 8).await;

    assert!(store.suggest_partition_column("t").await.unwrap().is_none());
    assert!(store
        .suggest_partition_column("missing")
        .await
        .unwrap()
        .is_none());
}

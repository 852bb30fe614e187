//! Tests for intent classification wiring: overrides, timeout fail-open,
//! and degradation when the keyword index is disabled.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lodestone::{
    IntentClassifier, QueryIntent, Record, RetrievalStore, SearchConfig, StoreConfig,
};

fn tool_record(id: &str, content: &str, vector: Vec<f32>) -> Record {
    let skill = id.split('.').next().unwrap_or("").to_string();
    Record {
        id: id.to_string(),
        content: content.to_string(),
        vector: Some(vector),
        skill_name: skill.clone(),
        category: skill,
        tool_name: id.to_string(),
        ..Record::default()
    }
}

async fn seeded_store(path: &std::path::Path, keyword: bool) -> RetrievalStore {
    let store = RetrievalStore::open(
        path.to_str().unwrap(),
        StoreConfig {
            dimension: 4,
            enable_keyword_index: keyword,
            ..StoreConfig::default()
        },
    )
    .await
    .unwrap();
    store
        .append(
            "tools",
            vec![
                tool_record("git.commit", "record changes", vec![1.0, 0.0, 0.0, 0.0]),
                tool_record("git.status", "show working tree", vec![0.0, 1.0, 0.0, 0.0]),
            ],
        )
        .await
        .unwrap();
    store
}

struct FixedClassifier(QueryIntent);

#[async_trait]
impl IntentClassifier for FixedClassifier {
    async fn classify(&self, _query: &str) -> Result<QueryIntent, lodestone::RetrievalError> {
        Ok(self.0)
    }
}

struct SlowClassifier;

#[async_trait]
impl IntentClassifier for SlowClassifier {
    async fn classify(&self, _query: &str) -> Result<QueryIntent, lodestone::RetrievalError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(QueryIntent::Semantic)
    }
}

#[tokio::test]
async fn test_exact_intent_returns_named_tool_first() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&temp_dir.path().join("intent_exact"), true).await;

    let hits = store
        .search(
            "tools",
            &[0.0, 0.0, 0.0, 1.0],
            Some("git.commit"),
            SearchConfig {
                intent: Some(QueryIntent::Exact),
                threshold: 0.0,
                ..SearchConfig::default()
            },
        )
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert_eq!(hits[0].name, "git.commit");
    // Exact intent answers from the keyword stream alone.
    assert_eq!(hits[0].vector_score, 0.0);
    assert!(hits[0].keyword_score > 0.0);
}

#[tokio::test]
async fn test_exact_intent_without_keyword_index_degrades() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&temp_dir.path().join("intent_nokw"), false).await;

    // Exact wants keyword-only; with the index disabled the call still
    // answers from the vector stream instead of failing.
    let hits = store
        .search(
            "tools",
            &[1.0, 0.0, 0.0, 0.0],
            Some("git.commit"),
            SearchConfig {
                intent: Some(QueryIntent::Exact),
                threshold: 0.0,
                ..SearchConfig::default()
            },
        )
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert_eq!(hits[0].name, "git.commit");
}

#[tokio::test]
async fn test_semantic_intent_skips_keyword_stream() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&temp_dir.path().join("intent_semantic"), true)
        .await
        .with_intent_classifier(Arc::new(FixedClassifier(QueryIntent::Semantic)));

    let hits = store
        .search(
            "tools",
            &[1.0, 0.0, 0.0, 0.0],
            Some("git commit"),
            SearchConfig {
                threshold: 0.0,
                ..SearchConfig::default()
            },
        )
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.keyword_score == 0.0));
}

#[tokio::test]
async fn test_slow_classifier_fails_open() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&temp_dir.path().join("intent_slow"), true)
        .await
        .with_intent_classifier(Arc::new(SlowClassifier));

    let started = std::time::Instant::now();
    let hits = store
        .search(
            "tools",
            &[1.0, 0.0, 0.0, 0.0],
            Some("record my changes"),
            SearchConfig {
                threshold: 0.0,
                ..SearchConfig::default()
            },
        )
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert!(
        started.elapsed() < Duration::from_secs(4),
        "classifier timeout did not fire"
    );
}

#[tokio::test]
async fn test_exact_intent_only_answers_from_searched_table() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&temp_dir.path().join("intent_scope"), true).await;
    store
        .append(
            "knowledge",
            vec![tool_record("notes.intro", "getting started", vec![0.0, 0.0, 1.0, 0.0])],
        )
        .await
        .unwrap();

    // git.commit lives only in "tools"; searching "knowledge" must not
    // surface it through the keyword stream.
    let hits = store
        .search(
            "knowledge",
            &[0.0, 0.0, 0.0, 1.0],
            Some("git.commit"),
            SearchConfig {
                intent: Some(QueryIntent::Exact),
                threshold: 0.0,
                ..SearchConfig::default()
            },
        )
        .await
        .unwrap();
    assert!(hits.iter().all(|h| h.name != "git.commit"));

    let scoped = store
        .search(
            "knowledge",
            &[0.0, 0.0, 0.0, 1.0],
            Some("notes.intro"),
            SearchConfig {
                intent: Some(QueryIntent::Exact),
                threshold: 0.0,
                ..SearchConfig::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(scoped[0].name, "notes.intro");
}

#[tokio::test]
async fn test_exact_intent_hits_carry_metadata() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(
        temp_dir.path().join("intent_meta").to_str().unwrap(),
        StoreConfig {
            dimension: 4,
            ..StoreConfig::default()
        },
    )
    .await
    .unwrap();

    let mut record = tool_record("git.commit", "record changes", vec![1.0, 0.0, 0.0, 0.0]);
    record.metadata = serde_json::json!({"source": "cli"});
    store.append("tools", vec![record]).await.unwrap();

    let hits = store
        .search(
            "tools",
            &[0.0, 0.0, 0.0, 1.0],
            Some("git.commit"),
            SearchConfig {
                intent: Some(QueryIntent::Exact),
                threshold: 0.0,
                ..SearchConfig::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(hits[0].name, "git.commit");
    assert_eq!(hits[0].metadata["source"], "cli");
}

#[tokio::test]
async fn test_search_without_vector_uses_keyword_stream() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&temp_dir.path().join("intent_novec"), true).await;

    let hits = store
        .search(
            "tools",
            &[],
            Some("git.commit"),
            SearchConfig {
                threshold: 0.0,
                ..SearchConfig::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(hits[0].name, "git.commit");
    assert!(hits.iter().all(|h| h.vector_score == 0.0));
}

#[tokio::test]
async fn test_search_without_vector_or_text_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = seeded_store(&temp_dir.path().join("intent_empty"), true).await;

    let err = store
        .search(
            "tools",
            &[],
            None,
            SearchConfig {
                threshold: 0.0,
                ..SearchConfig::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, lodestone::RetrievalError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_query_intent_parses_from_str() {
    assert_eq!("exact".parse::<QueryIntent>().unwrap(), QueryIntent::Exact);
    assert_eq!(
        "semantic".parse::<QueryIntent>().unwrap(),
        QueryIntent::Semantic
    );
    assert_eq!(
        "nonsense".parse::<QueryIntent>().unwrap(),
        QueryIntent::Hybrid
    );
}

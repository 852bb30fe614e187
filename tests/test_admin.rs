//! Tests for table administration: drops, schema evolution, versions.

use lodestone::{
    Record, RetrievalError, RetrievalStore, StoreConfig, TableColumnAlteration, TableColumnType,
    TableNewColumn,
};

fn config(dim: usize) -> StoreConfig {
    StoreConfig {
        dimension: dim,
        enable_keyword_index: false,
        ..StoreConfig::default()
    }
}

fn record(id: &str, vector: Vec<f32>) -> Record {
    Record {
        id: id.to_string(),
        content: format!("content for {id}"),
        vector: Some(vector),
        skill_name: "skill".to_string(),
        category: "test".to_string(),
        tool_name: id.to_string(),
        ..Record::default()
    }
}

#[tokio::test]
async fn test_drop_table_removes_data() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(4))
        .await
        .unwrap();
    store
        .append("tools", vec![record("skill.one", vec![0.1; 4])])
        .await
        .unwrap();
    assert_eq!(store.count("tools").await.unwrap(), 1);

    store.drop_table("tools").await.unwrap();
    assert_eq!(store.count("tools").await.unwrap(), 0);
    assert!(!temp_dir.path().join("tools.lance").exists());

    // Dropping again is a no-op.
    store.drop_table("tools").await.unwrap();
}

#[tokio::test]
async fn test_add_and_drop_columns() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(4))
        .await
        .unwrap();
    store
        .append("tools", vec![record("skill.one", vec![0.1; 4])])
        .await
        .unwrap();

    store
        .add_columns(
            "tools",
            vec![TableNewColumn {
                name: "priority".to_string(),
                data_type: TableColumnType::Int64,
                nullable: true,
            }],
        )
        .await
        .unwrap();

    let info = store.get_table_info("tools").await.unwrap();
    assert!(info.schema.contains("priority"));

    store
        .drop_columns("tools", vec!["priority".to_string()])
        .await
        .unwrap();
    let info = store.get_table_info("tools").await.unwrap();
    assert!(!info.schema.contains("priority"));
}

#[tokio::test]
async fn test_rename_added_column() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(4))
        .await
        .unwrap();
    store
        .append("tools", vec![record("skill.one", vec![0.1; 4])])
        .await
        .unwrap();
    store
        .add_columns(
            "tools",
            vec![TableNewColumn {
                name: "notes".to_string(),
                data_type: TableColumnType::Utf8,
                nullable: true,
            }],
        )
        .await
        .unwrap();

    store
        .alter_columns(
            "tools",
            vec![TableColumnAlteration::Rename {
                path: "notes".to_string(),
                new_name: "annotations".to_string(),
            }],
        )
        .await
        .unwrap();

    let info = store.get_table_info("tools").await.unwrap();
    assert!(info.schema.contains("annotations"));
    assert!(!info.schema.contains("notes"));
}

#[tokio::test]
async fn test_reserved_columns_are_protected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(4))
        .await
        .unwrap();
    store
        .append("tools", vec![record("skill.one", vec![0.1; 4])])
        .await
        .unwrap();

    let err = store
        .drop_columns("tools", vec!["vector".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidConfig(_)));

    let err = store
        .alter_columns(
            "tools",
            vec![TableColumnAlteration::Rename {
                path: "id".to_string(),
                new_name: "identifier".to_string(),
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidConfig(_)));

    let err = store
        .add_columns(
            "tools",
            vec![TableNewColumn {
                name: "content".to_string(),
                data_type: TableColumnType::Utf8,
                nullable: true,
            }],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_versions_grow_with_appends() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(4))
        .await
        .unwrap();
    store
        .append("tools", vec![record("skill.one", vec![0.1; 4])])
        .await
        .unwrap();
    let before = store.list_versions("tools").await.unwrap().len();

    store
        .append("tools", vec![record("skill.two", vec![0.2; 4])])
        .await
        .unwrap();
    let after = store.list_versions("tools").await.unwrap().len();
    assert!(after > before);
}

#[tokio::test]
async fn test_checkout_version_reads_old_snapshot() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(4))
        .await
        .unwrap();
    store
        .append("tools", vec![record("skill.one", vec![0.1; 4])])
        .await
        .unwrap();
    let info = store.get_table_info("tools").await.unwrap();

    store
        .append("tools", vec![record("skill.two", vec![0.2; 4])])
        .await
        .unwrap();
    assert_eq!(store.count("tools").await.unwrap(), 2);

    let snapshot = store
        .checkout_version("tools", info.version_id)
        .await
        .unwrap();
    assert_eq!(snapshot.count_rows(None).await.unwrap(), 1);

    // The live handle is unaffected by the checkout.
    assert_eq!(store.count("tools").await.unwrap(), 2);
}

#[tokio::test]
async fn test_get_fragment_stats() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = RetrievalStore::open(temp_dir.path().to_str().unwrap(), config(4))
        .await
        .unwrap();
    store
        .append("tools", vec![record("skill.one", vec![0.1; 4])])
        .await
        .unwrap();
    store
        .append("tools", vec![record("skill.two", vec![0.2; 4])])
        .await
        .unwrap();

    let stats = store.get_fragment_stats("tools").await.unwrap();
    assert!(!stats.is_empty());
    let total: usize = stats.iter().map(|f| f.num_rows).sum();
    assert_eq!(total, 2);
}

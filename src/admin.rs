//! Table administration: counts, drops, schema evolution, introspection.

use lance::dataset::{ColumnAlteration as LanceColumnAlteration, Dataset, NewColumnTransform};
use lance::deps::arrow_schema::{DataType, Field, Schema};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::RetrievalError;
use crate::schema::is_reserved_column;
use crate::RetrievalStore;

/// Basic table info for dashboards and diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    /// Latest committed version id.
    pub version_id: u64,
    /// Commit timestamp (RFC 3339).
    pub commit_timestamp: String,
    /// Live row count.
    pub num_rows: u64,
    /// Debug rendering of the Lance schema.
    pub schema: String,
    /// Number of physical fragments.
    pub fragment_count: usize,
}

/// One historical version of a table.
#[derive(Debug, Clone, Serialize)]
pub struct TableVersionInfo {
    /// Version id.
    pub version_id: u64,
    /// Commit timestamp (RFC 3339).
    pub timestamp: String,
    /// Commit metadata.
    pub metadata: std::collections::BTreeMap<String, String>,
}

/// Per-fragment row/file stats for query tuning.
#[derive(Debug, Clone, Serialize)]
pub struct FragmentInfo {
    /// Fragment id.
    pub id: usize,
    /// Live rows (exclusive of deletions).
    pub num_rows: usize,
    /// Physical rows before deletions, when available.
    pub physical_rows: Option<usize>,
    /// Number of data files.
    pub num_data_files: usize,
}

/// Column types supported by `add_columns`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableColumnType {
    /// UTF-8 string.
    Utf8,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit float.
    Float64,
    /// Boolean.
    Boolean,
}

/// A new column to add via schema evolution (backfilled with nulls).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableNewColumn {
    /// Column name; must not collide with a reserved column.
    pub name: String,
    /// Column type.
    pub data_type: TableColumnType,
    /// Whether the column is nullable.
    pub nullable: bool,
}

/// A column alteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum TableColumnAlteration {
    /// Rename a column.
    Rename {
        /// Existing column path.
        path: String,
        /// New name.
        new_name: String,
    },
    /// Change a column's nullability.
    SetNullable {
        /// Existing column path.
        path: String,
        /// New nullability.
        nullable: bool,
    },
}

fn ensure_non_reserved(column: &str) -> Result<(), RetrievalError> {
    if is_reserved_column(column) {
        return Err(RetrievalError::InvalidConfig(format!(
            "column '{column}' is reserved and cannot be altered or dropped"
        )));
    }
    Ok(())
}

impl RetrievalStore {
    /// Row count; zero for a missing table.
    pub async fn count(&self, table_name: &str) -> Result<u64, RetrievalError> {
        if !self.table_path(table_name).exists() {
            return Ok(0);
        }
        let dataset = self.open_table(table_name).await?;
        Ok(dataset.count_rows(None).await? as u64)
    }

    /// Drop a table and remove its data from disk, along with its keyword
    /// documents. Missing tables are a no-op.
    pub async fn drop_table(&self, table_name: &str) -> Result<(), RetrievalError> {
        let table_path = self.table_path(table_name);
        let mut cache = self.datasets_mut().await;
        cache.remove(table_name);
        if table_path.exists() {
            std::fs::remove_dir_all(&table_path)?;
        }
        drop(cache);
        if let Some(kw_index) = self.keyword_index() {
            if let Err(e) = kw_index.delete_table(table_name) {
                log::warn!("keyword cleanup failed for dropped table '{table_name}': {e}");
            }
        }
        Ok(())
    }

    /// Add new columns via schema evolution; existing rows read as null.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::InvalidConfig`] for reserved column names.
    pub async fn add_columns(
        &self,
        table_name: &str,
        columns: Vec<TableNewColumn>,
    ) -> Result<(), RetrievalError> {
        if columns.is_empty() {
            return Ok(());
        }
        let mut dataset = self.open_table(table_name).await?;
        let fields = columns
            .into_iter()
            .map(|column| {
                ensure_non_reserved(&column.name)?;
                let data_type = match column.data_type {
                    TableColumnType::Utf8 => DataType::Utf8,
                    TableColumnType::Int64 => DataType::Int64,
                    TableColumnType::Float64 => DataType::Float64,
                    TableColumnType::Boolean => DataType::Boolean,
                };
                Ok(Field::new(&column.name, data_type, column.nullable))
            })
            .collect::<Result<Vec<_>, RetrievalError>>()?;

        let schema = Arc::new(Schema::new(fields));
        dataset
            .add_columns(NewColumnTransform::AllNulls(schema), None, None)
            .await?;
        self.refresh_cached(table_name, dataset).await;
        Ok(())
    }

    /// Apply renames and nullability changes.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::InvalidConfig`] when an alteration touches a
    /// reserved column.
    pub async fn alter_columns(
        &self,
        table_name: &str,
        alterations: Vec<TableColumnAlteration>,
    ) -> Result<(), RetrievalError> {
        if alterations.is_empty() {
            return Ok(());
        }
        let mut dataset = self.open_table(table_name).await?;
        let mut lance_alterations = Vec::with_capacity(alterations.len());
        for alteration in alterations {
            match alteration {
                TableColumnAlteration::Rename { path, new_name } => {
                    ensure_non_reserved(&path)?;
                    lance_alterations.push(LanceColumnAlteration::new(path).rename(new_name));
                }
                TableColumnAlteration::SetNullable { path, nullable } => {
                    ensure_non_reserved(&path)?;
                    lance_alterations.push(LanceColumnAlteration::new(path).set_nullable(nullable));
                }
            }
        }
        dataset.alter_columns(&lance_alterations).await?;
        self.refresh_cached(table_name, dataset).await;
        Ok(())
    }

    /// Drop non-reserved columns.
    pub async fn drop_columns(
        &self,
        table_name: &str,
        columns: Vec<String>,
    ) -> Result<(), RetrievalError> {
        if columns.is_empty() {
            return Ok(());
        }
        for column in &columns {
            ensure_non_reserved(column)?;
        }
        let mut dataset = self.open_table(table_name).await?;
        let refs: Vec<&str> = columns.iter().map(String::as_str).collect();
        dataset.drop_columns(&refs).await?;
        self.refresh_cached(table_name, dataset).await;
        Ok(())
    }

    /// Basic table observability info.
    pub async fn get_table_info(&self, table_name: &str) -> Result<TableInfo, RetrievalError> {
        let dataset = self.open_table(table_name).await?;
        let version = dataset.version();
        let num_rows = dataset.count_rows(None).await?;
        Ok(TableInfo {
            version_id: version.version,
            commit_timestamp: version.timestamp.to_rfc3339(),
            num_rows: num_rows as u64,
            schema: format!("{:?}", dataset.schema()),
            fragment_count: dataset.count_fragments(),
        })
    }

    /// Per-fragment row/file stats.
    pub async fn get_fragment_stats(
        &self,
        table_name: &str,
    ) -> Result<Vec<FragmentInfo>, RetrievalError> {
        let dataset = self.open_table(table_name).await?;
        let mut stats = Vec::new();
        for fragment in dataset.get_fragments() {
            let num_rows = fragment.count_rows(None).await?;
            let metadata = fragment.metadata();
            stats.push(FragmentInfo {
                id: fragment.id(),
                num_rows,
                physical_rows: metadata.physical_rows,
                num_data_files: metadata.files.len(),
            });
        }
        Ok(stats)
    }

    /// All historical versions of a table (time travel metadata).
    pub async fn list_versions(
        &self,
        table_name: &str,
    ) -> Result<Vec<TableVersionInfo>, RetrievalError> {
        let dataset = self.open_table(table_name).await?;
        let versions = dataset.versions().await?;
        Ok(versions
            .into_iter()
            .map(|version| TableVersionInfo {
                version_id: version.version,
                timestamp: version.timestamp.to_rfc3339(),
                metadata: version.metadata,
            })
            .collect())
    }

    /// Open a historical snapshot by version id.
    pub async fn checkout_version(
        &self,
        table_name: &str,
        version: u64,
    ) -> Result<Dataset, RetrievalError> {
        let dataset = self.open_table(table_name).await?;
        Ok(dataset.checkout_version(version).await?)
    }
}

//! Streaming schema migration with a temp-table swap.
//!
//! Version history:
//! - v1: `tool_name` plain Utf8; `routing_keywords`/`intents` delimited Utf8
//! - v2: `tool_name` Dictionary<Int32, Utf8>; lists still delimited Utf8
//! - v3 (current): `routing_keywords`/`intents` as native List<Utf8>
//!
//! The rewrite streams batch-by-batch into `<table>.lance.migrating` and
//! only swaps directories once every batch has landed, so a crash mid-run
//! leaves the original table untouched.

use std::sync::Arc;

use futures::TryStreamExt;
use lance::dataset::{Dataset, WriteParams};
use lance::deps::arrow_array::builder::{ListBuilder, StringBuilder};
use lance::deps::arrow_array::types::Int32Type;
use lance::deps::arrow_array::{
    Array, DictionaryArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use lance::deps::arrow_schema::{DataType, Schema};
use serde::Serialize;

use crate::error::{ArrowError, RetrievalError};
use crate::schema::{
    self, intents_at, routing_keywords_at, schema_version_of, utf8_at, CATEGORY_COLUMN,
    CONTENT_COLUMN, CURRENT_SCHEMA_VERSION, FILE_PATH_COLUMN, ID_COLUMN, INTENTS_COLUMN,
    METADATA_COLUMN, ROUTING_KEYWORDS_COLUMN, SKILL_NAME_COLUMN, TOOL_NAME_COLUMN, VECTOR_COLUMN,
};
use crate::RetrievalStore;

/// One pending migration step.
#[derive(Debug, Clone, Serialize)]
pub struct PendingMigration {
    /// Schema version before this step.
    pub from_version: u32,
    /// Schema version after this step.
    pub to_version: u32,
    /// Human-readable description of the change.
    pub description: String,
}

/// Result of a `migrate` call.
#[derive(Debug, Default, Serialize)]
pub struct MigrationReport {
    /// Pairs (from_version, to_version) that were (or would be) applied.
    pub applied: Vec<(u32, u32)>,
    /// Rows rewritten; zero for dry runs.
    pub rows_processed: u64,
    /// True when nothing was written (no pending work, or `force` unset).
    pub dry_run: bool,
}

fn step_description(from: u32, to: u32) -> String {
    match (from, to) {
        (1, 2) => "tool_name Utf8 → Dictionary".to_string(),
        (2, 3) => "routing_keywords/intents delimited Utf8 → List<Utf8>".to_string(),
        _ => format!("schema v{from} → v{to}"),
    }
}

fn migration_write_params() -> WriteParams {
    WriteParams {
        data_storage_version: Some(lance_file::version::LanceFileVersion::V2_1),
        ..WriteParams::default()
    }
}

fn build_string_dictionary(values: &[String]) -> Result<DictionaryArray<Int32Type>, ArrowError> {
    let mut uniq: Vec<String> = Vec::new();
    let mut map: std::collections::HashMap<&str, i32> = std::collections::HashMap::new();
    for s in values {
        if !map.contains_key(s.as_str()) {
            map.insert(s.as_str(), uniq.len() as i32);
            uniq.push(s.clone());
        }
    }
    let keys: Vec<i32> = values.iter().map(|s| *map.get(s.as_str()).unwrap_or(&0)).collect();
    DictionaryArray::<Int32Type>::try_new(
        Int32Array::from(keys),
        Arc::new(StringArray::from(uniq)),
    )
}

fn required_column<'a>(
    batch: &'a RecordBatch,
    table: &str,
    name: &str,
) -> Result<&'a Arc<dyn Array>, RetrievalError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RetrievalError::ColumnNotFound {
            table: table.to_string(),
            column: name.to_string(),
        })
}

/// Convert one batch of any supported legacy encoding to the v3 layout.
fn convert_batch(
    batch: &RecordBatch,
    schema_v3: &Arc<Schema>,
    table: &str,
) -> Result<RecordBatch, RetrievalError> {
    let rows = batch.num_rows();

    let dict_column = |name: &str| -> Result<Arc<dyn Array>, RetrievalError> {
        let col = required_column(batch, table, name)?;
        if !matches!(
            col.data_type(),
            DataType::Utf8 | DataType::Dictionary(_, _)
        ) {
            return Err(RetrievalError::MigrationIncomplete {
                table: table.to_string(),
                column: name.to_string(),
            });
        }
        let values: Vec<String> = (0..rows).map(|i| utf8_at(col.as_ref(), i)).collect();
        Ok(Arc::new(build_string_dictionary(&values)?))
    };

    let keywords_col = required_column(batch, table, ROUTING_KEYWORDS_COLUMN)?;
    let intents_col = required_column(batch, table, INTENTS_COLUMN)?;
    let mut keywords_builder = ListBuilder::new(StringBuilder::new());
    let mut intents_builder = ListBuilder::new(StringBuilder::new());
    for i in 0..rows {
        for s in routing_keywords_at(keywords_col.as_ref(), i) {
            keywords_builder.values().append_value(s.as_str());
        }
        keywords_builder.append(true);
        for s in intents_at(intents_col.as_ref(), i) {
            intents_builder.values().append_value(s.as_str());
        }
        intents_builder.append(true);
    }

    // Metadata arrived after v1; absent columns become all-null.
    let metadata: Arc<dyn Array> = match batch.column_by_name(METADATA_COLUMN) {
        Some(col) => col.clone(),
        None => Arc::new(StringArray::from(vec![None::<&str>; rows])),
    };

    let columns: Vec<Arc<dyn Array>> = vec![
        required_column(batch, table, ID_COLUMN)?.clone(),
        required_column(batch, table, VECTOR_COLUMN)?.clone(),
        required_column(batch, table, CONTENT_COLUMN)?.clone(),
        dict_column(SKILL_NAME_COLUMN)?,
        dict_column(CATEGORY_COLUMN)?,
        dict_column(TOOL_NAME_COLUMN)?,
        required_column(batch, table, FILE_PATH_COLUMN)?.clone(),
        Arc::new(keywords_builder.finish()),
        Arc::new(intents_builder.finish()),
        metadata,
    ];

    Ok(RecordBatch::try_new(schema_v3.clone(), columns)?)
}

impl RetrievalStore {
    /// List pending migrations for a table. Tables without a `tool_name`
    /// column (non-routing tables) never migrate.
    pub async fn check_migrations(
        &self,
        table_name: &str,
    ) -> Result<Vec<PendingMigration>, RetrievalError> {
        let table_path = self.table_path(table_name);
        if !table_path.exists() {
            return Ok(vec![]);
        }
        let dataset = Dataset::open(table_path.to_string_lossy().as_ref()).await?;
        let arrow_schema = Schema::from(dataset.schema());
        if arrow_schema.field_with_name(TOOL_NAME_COLUMN).is_err() {
            return Ok(vec![]);
        }
        let mut out = Vec::new();
        let mut v = schema_version_of(&arrow_schema);
        while v < CURRENT_SCHEMA_VERSION {
            out.push(PendingMigration {
                from_version: v,
                to_version: v + 1,
                description: step_description(v, v + 1),
            });
            v += 1;
        }
        Ok(out)
    }

    /// Migrate a table to the current schema version.
    ///
    /// `force = false` is a dry run: the report lists what would be applied
    /// and nothing is written. `force = true` streams the table through the
    /// conversion into a temporary sibling directory and swaps it into place
    /// once complete.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::MigrationIncomplete`] when a column's physical
    /// encoding is not one the converter understands.
    pub async fn migrate(
        &self,
        table_name: &str,
        force: bool,
    ) -> Result<MigrationReport, RetrievalError> {
        let pending = self.check_migrations(table_name).await?;
        if pending.is_empty() {
            return Ok(MigrationReport {
                dry_run: true,
                ..MigrationReport::default()
            });
        }
        let applied: Vec<(u32, u32)> = pending
            .iter()
            .map(|p| (p.from_version, p.to_version))
            .collect();
        if !force {
            return Ok(MigrationReport {
                applied,
                rows_processed: 0,
                dry_run: true,
            });
        }

        let table_path = self.table_path(table_name);
        let temp_path = table_path.with_extension("lance.migrating");
        if temp_path.exists() {
            // Leftover from a crashed run; the original table is still whole.
            std::fs::remove_dir_all(&temp_path)?;
        }

        // Exclusive for the whole rewrite: writers acquire their handles
        // through this lock, so no new write can start mid-stream.
        let mut cache = self.datasets_mut().await;
        cache.remove(table_name);

        let dataset = Dataset::open(table_path.to_string_lossy().as_ref()).await?;
        let source_version = dataset.version().version;
        let old_schema = Schema::from(dataset.schema());
        let schema_v3 = schema::table_schema(vector_dimension_of(&old_schema));

        let old_columns: Vec<&str> = old_schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect();
        let mut scanner = dataset.scan();
        scanner.project(&old_columns)?;
        let mut stream = scanner.try_into_stream().await?;

        let temp_uri = temp_path.to_string_lossy().into_owned();
        let mut rows_processed = 0_u64;
        let mut temp_dataset: Option<Dataset> = None;

        while let Some(batch) = stream.try_next().await? {
            rows_processed += batch.num_rows() as u64;
            let converted = convert_batch(&batch, &schema_v3, table_name)?;
            let batches: Vec<Result<RecordBatch, ArrowError>> = vec![Ok(converted)];
            let reader = Box::new(RecordBatchIterator::new(batches, schema_v3.clone()));
            match temp_dataset.as_mut() {
                None => {
                    temp_dataset = Some(
                        Dataset::write(reader, temp_uri.as_str(), Some(migration_write_params()))
                            .await?,
                    );
                }
                Some(ds) => ds.append(reader, Some(migration_write_params())).await?,
            }
        }

        if temp_dataset.is_none() {
            // Empty table: write an empty v3 dataset so the swap still
            // upgrades the schema.
            let batches: Vec<Result<RecordBatch, ArrowError>> =
                vec![Ok(RecordBatch::new_empty(schema_v3.clone()))];
            Dataset::write(
                Box::new(RecordBatchIterator::new(batches, schema_v3.clone())),
                temp_uri.as_str(),
                Some(migration_write_params()),
            )
            .await?;
        }
        drop(stream);

        // A writer that took its handle before this migration locked the
        // cache may still have committed; never swap over a table that
        // moved under the stream.
        let latest = Dataset::open(table_path.to_string_lossy().as_ref()).await?;
        if latest.version().version != source_version {
            std::fs::remove_dir_all(&temp_path)?;
            return Err(RetrievalError::General(format!(
                "table '{table_name}' was written during migration, rerun migrate"
            )));
        }

        std::fs::remove_dir_all(&table_path)?;
        std::fs::rename(&temp_path, &table_path)?;
        drop(cache);
        log::info!(
            "migrated '{table_name}' to schema v{CURRENT_SCHEMA_VERSION} ({rows_processed} rows)"
        );

        Ok(MigrationReport {
            applied,
            rows_processed,
            dry_run: false,
        })
    }
}

fn vector_dimension_of(schema: &Schema) -> usize {
    schema
        .field_with_name(VECTOR_COLUMN)
        .ok()
        .and_then(|f| match f.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        })
        .unwrap_or(schema::DEFAULT_DIMENSION)
}

//! Write path: record batches, appends, partition-aware appends, deletes.

use std::collections::BTreeMap;
use std::sync::Arc;

use lance::deps::arrow_array::builder::{ListBuilder, StringBuilder, StringDictionaryBuilder};
use lance::deps::arrow_array::types::Int32Type;
use lance::deps::arrow_array::{
    FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use lance::deps::arrow_schema::{DataType, Field, Schema};

use crate::error::{ArrowError, RetrievalError};
use crate::keyword::KeywordDoc;
use crate::record::Record;
use crate::schema::{self, CATEGORY_COLUMN, SKILL_NAME_COLUMN};
use crate::RetrievalStore;

impl RetrievalStore {
    /// Append records to a table, creating it on first write.
    ///
    /// Records are normalized first (token lists trimmed and de-duplicated).
    /// Routable tool records are dual-written into the keyword index when it
    /// is enabled; a keyword-index failure is logged, not propagated, since
    /// the Lance write has already committed.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::DimensionMismatch`] when any record's vector length
    /// differs from the store dimension.
    pub async fn append(
        &self,
        table_name: &str,
        mut records: Vec<Record>,
    ) -> Result<(), RetrievalError> {
        if records.is_empty() {
            return Ok(());
        }
        for record in &mut records {
            record.normalize();
        }

        let schema = schema::table_schema(self.dimension());
        let batch = self.build_batch(&schema, &records)?;

        let mut dataset = self.get_or_create_dataset(table_name).await?;
        let batches: Vec<Result<RecordBatch, ArrowError>> = vec![Ok(batch)];
        dataset
            .append(Box::new(RecordBatchIterator::new(batches, schema)), None)
            .await?;
        self.refresh_cached(table_name, dataset).await;

        if let Some(kw_index) = self.keyword_index() {
            let docs: Vec<_> = records
                .iter()
                .filter(|r| r.is_tool())
                .map(|r| KeywordDoc {
                    table: table_name.to_string(),
                    name: r.tool_name.clone(),
                    description: r.content.clone(),
                    category: if r.category.is_empty() {
                        r.skill_name.clone()
                    } else {
                        r.category.clone()
                    },
                    keywords: r.routing_keywords.clone(),
                    intents: r.intents.clone(),
                    metadata: r.metadata.clone(),
                })
                .collect();
            if !docs.is_empty() {
                if let Err(e) = kw_index.bulk_upsert(docs) {
                    log::warn!("keyword dual-write failed for '{table_name}': {e}");
                }
            }
        }
        Ok(())
    }

    /// Append records grouped by a partition column (`skill_name` or
    /// `category`), one append per group in stable group order, so physical
    /// fragments align with partition values.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::InvalidConfig`] for unsupported partition columns.
    pub async fn append_partitioned(
        &self,
        table_name: &str,
        partition_column: &str,
        records: Vec<Record>,
    ) -> Result<(), RetrievalError> {
        if partition_column != SKILL_NAME_COLUMN && partition_column != CATEGORY_COLUMN {
            return Err(RetrievalError::InvalidConfig(format!(
                "unsupported partition column '{partition_column}'"
            )));
        }

        let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
        for record in records {
            let key = if partition_column == SKILL_NAME_COLUMN {
                record.skill_name.clone()
            } else {
                record.category.clone()
            };
            groups.entry(key).or_default().push(record);
        }

        for (key, group) in groups {
            log::debug!(
                "partitioned append: {} rows for {partition_column}='{key}'",
                group.len()
            );
            self.append(table_name, group).await?;
        }
        Ok(())
    }

    /// Delete rows by id. Routable identifiers among the deleted ids are
    /// removed from the keyword index too.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::TableNotFound`] if the table doesn't exist.
    pub async fn delete(&self, table_name: &str, ids: &[String]) -> Result<(), RetrievalError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut dataset = self.open_table(table_name).await?;
        let quoted: Vec<String> = ids
            .iter()
            .map(|id| format!("'{}'", id.replace('\'', "''")))
            .collect();
        dataset
            .delete(&format!("id IN ({})", quoted.join(", ")))
            .await?;
        self.refresh_cached(table_name, dataset).await;

        if let Some(kw_index) = self.keyword_index() {
            let routable: Vec<String> = ids
                .iter()
                .filter(|id| crate::record::is_identifier_shaped(id))
                .cloned()
                .collect();
            if let Err(e) = kw_index.delete(table_name, &routable) {
                log::warn!("keyword delete failed for '{table_name}': {e}");
            }
        }
        Ok(())
    }

    /// Replace a table's contents with a fresh snapshot (drop, then write).
    pub async fn replace_all(
        &self,
        table_name: &str,
        records: Vec<Record>,
    ) -> Result<(), RetrievalError> {
        self.drop_table(table_name).await?;
        self.append(table_name, records).await
    }

    fn build_batch(
        &self,
        schema: &Arc<Schema>,
        records: &[Record],
    ) -> Result<RecordBatch, RetrievalError> {
        let dimension = self.dimension();
        for record in records {
            if let Some(v) = &record.vector {
                if v.len() != dimension {
                    return Err(RetrievalError::DimensionMismatch {
                        expected: dimension,
                        actual: v.len(),
                    });
                }
            }
        }

        let ids = StringArray::from(records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>());
        let contents =
            StringArray::from(records.iter().map(|r| r.content.as_str()).collect::<Vec<_>>());
        let file_paths =
            StringArray::from(records.iter().map(|r| r.file_path.as_str()).collect::<Vec<_>>());

        // Rows without an embedding store a zero vector.
        let mut flat = Vec::with_capacity(records.len() * dimension);
        for record in records {
            match &record.vector {
                Some(v) => flat.extend_from_slice(v),
                None => flat.resize(flat.len() + dimension, 0.0),
            }
        }
        let vectors = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            i32::try_from(dimension).unwrap_or(i32::MAX),
            Arc::new(Float32Array::from(flat)),
            None,
        )?;

        let mut skill_builder = StringDictionaryBuilder::<Int32Type>::new();
        let mut category_builder = StringDictionaryBuilder::<Int32Type>::new();
        let mut tool_builder = StringDictionaryBuilder::<Int32Type>::new();
        let mut keywords_builder = ListBuilder::new(StringBuilder::new());
        let mut intents_builder = ListBuilder::new(StringBuilder::new());
        let mut metadatas = StringBuilder::new();

        for record in records {
            skill_builder.append_value(&record.skill_name);
            category_builder.append_value(&record.category);
            tool_builder.append_value(&record.tool_name);
            for kw in &record.routing_keywords {
                keywords_builder.values().append_value(kw);
            }
            keywords_builder.append(true);
            for intent in &record.intents {
                intents_builder.values().append_value(intent);
            }
            intents_builder.append(true);
            if record.metadata.is_null() {
                metadatas.append_null();
            } else {
                metadatas.append_value(record.metadata.to_string());
            }
        }

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(ids),
                Arc::new(vectors),
                Arc::new(contents),
                Arc::new(skill_builder.finish()),
                Arc::new(category_builder.finish()),
                Arc::new(tool_builder.finish()),
                Arc::new(file_paths),
                Arc::new(keywords_builder.finish()),
                Arc::new(intents_builder.finish()),
                Arc::new(metadatas.finish()),
            ],
        )?;
        Ok(batch)
    }
}

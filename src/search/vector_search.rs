//! Vector-only and full-text search over a table's scanner.

use futures::TryStreamExt;
use lance::deps::arrow_array::{Array, Float32Array, StringArray};
use lance_index::scalar::FullTextSearchQuery;
use serde_json::Value;

use crate::error::RetrievalError;
use crate::schema::{utf8_at, CONTENT_COLUMN, ID_COLUMN, METADATA_COLUMN, TOOL_NAME_COLUMN, VECTOR_COLUMN};
use crate::search::options::SearchOptions;
use crate::search::types::VectorHit;
use crate::RetrievalStore;

/// Over-fetch multiplier to absorb filtering loss before the final cut.
const FETCH_MULTIPLIER: usize = 2;

impl RetrievalStore {
    /// Nearest-neighbor search, flat or ANN depending on whether a vector
    /// index exists.
    ///
    /// Results are sorted by non-decreasing distance with stable ties and
    /// truncated to `limit`.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::TableNotFound`] if the table doesn't exist,
    /// [`RetrievalError::DimensionMismatch`] if the query length differs
    /// from the store dimension, [`RetrievalError::InvalidConfig`] if the
    /// projection is empty.
    pub async fn vector_search(
        &self,
        table_name: &str,
        query: Vec<f32>,
        limit: usize,
        options: SearchOptions,
    ) -> Result<Vec<VectorHit>, RetrievalError> {
        if query.len() != self.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }
        if options.projected_columns.is_empty() {
            return Err(RetrievalError::InvalidConfig(
                "projected_columns must not be empty".to_string(),
            ));
        }

        let dataset = self.open_table(table_name).await?;
        let query_arr = Float32Array::from(query);

        let mut scanner = dataset.scan();
        let fetch_count = limit.saturating_mul(FETCH_MULTIPLIER).max(limit + 10);
        scanner.project(&options.projected_columns)?;
        scanner.nearest(VECTOR_COLUMN, &query_arr, fetch_count)?;
        if let Some(batch_size) = options.batch_size {
            scanner.batch_size(batch_size);
        }
        if let Some(fragment_readahead) = options.fragment_readahead {
            scanner.fragment_readahead(fragment_readahead);
        }
        if let Some(batch_readahead) = options.batch_readahead {
            scanner.batch_readahead(batch_readahead);
        }
        if let Some(filter) = options
            .where_filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
        {
            scanner.filter(filter)?;
        }
        let scan_limit = options.scan_limit.unwrap_or(fetch_count);
        scanner.limit(Some(i64::try_from(scan_limit).unwrap_or(i64::MAX)), None)?;

        let mut stream = scanner.try_into_stream().await?;
        let mut results = Vec::new();

        while let Some(batch) = stream.try_next().await? {
            let ids = string_column(&batch, ID_COLUMN, table_name)?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>().cloned())
                .ok_or_else(|| RetrievalError::ColumnNotFound {
                    table: table_name.to_string(),
                    column: "_distance".to_string(),
                })?;
            let contents = batch.column_by_name(CONTENT_COLUMN);
            let tool_names = batch.column_by_name(TOOL_NAME_COLUMN);
            let metadata_col = batch.column_by_name(METADATA_COLUMN);

            for i in 0..batch.num_rows() {
                let id = ids.value(i).to_string();
                let name = tool_names
                    .map(|c| utf8_at(c.as_ref(), i))
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| id.clone());
                let content = contents
                    .map(|c| utf8_at(c.as_ref(), i))
                    .unwrap_or_default();
                results.push(VectorHit {
                    id,
                    name,
                    content,
                    distance: distances.value(i),
                    metadata: parse_metadata(metadata_col, i),
                });
            }
        }

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(limit);
        Ok(results)
    }

    /// Full-text search over `content` using the Lance inverted index.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::TableNotFound`] if the table doesn't exist; Lance
    /// errors surface when no FTS index has been created.
    pub async fn fts_search(
        &self,
        table_name: &str,
        query: &str,
        limit: usize,
        where_filter: Option<&str>,
    ) -> Result<Vec<VectorHit>, RetrievalError> {
        let dataset = self.open_table(table_name).await?;

        let mut scanner = dataset.scan();
        scanner.project(&[ID_COLUMN, CONTENT_COLUMN, TOOL_NAME_COLUMN, METADATA_COLUMN])?;
        scanner.full_text_search(FullTextSearchQuery::new(query.to_string()))?;
        if let Some(filter) = where_filter.map(str::trim).filter(|f| !f.is_empty()) {
            scanner.filter(filter)?;
        }
        scanner.limit(Some(i64::try_from(limit).unwrap_or(i64::MAX)), None)?;

        let mut stream = scanner.try_into_stream().await?;
        let mut results = Vec::new();

        while let Some(batch) = stream.try_next().await? {
            let ids = string_column(&batch, ID_COLUMN, table_name)?;
            let contents = batch.column_by_name(CONTENT_COLUMN);
            let tool_names = batch.column_by_name(TOOL_NAME_COLUMN);
            let metadata_col = batch.column_by_name(METADATA_COLUMN);

            for i in 0..batch.num_rows() {
                let id = ids.value(i).to_string();
                let name = tool_names
                    .map(|c| utf8_at(c.as_ref(), i))
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| id.clone());
                results.push(VectorHit {
                    id,
                    name,
                    content: contents
                        .map(|c| utf8_at(c.as_ref(), i))
                        .unwrap_or_default(),
                    distance: 0.0,
                    metadata: parse_metadata(metadata_col, i),
                });
            }
        }
        Ok(results)
    }

    /// BM25 keyword search through the Tantivy index, scoped to one table;
    /// CPU-bound, so it runs under `spawn_blocking`.
    ///
    /// # Errors
    ///
    /// [`RetrievalError::IndexUnavailable`] when the store was opened
    /// without a keyword index.
    pub async fn keyword_search(
        &self,
        table_name: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<crate::keyword::KeywordHit>, RetrievalError> {
        let index = self
            .keyword_index()
            .ok_or_else(|| RetrievalError::IndexUnavailable {
                table: table_name.to_string(),
                index: "keyword".to_string(),
            })?
            .clone();
        let table = table_name.to_string();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || index.search(&query, limit, Some(&table))).await?
    }
}

fn string_column(
    batch: &lance::deps::arrow_array::RecordBatch,
    name: &str,
    table: &str,
) -> Result<StringArray, RetrievalError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>().cloned())
        .ok_or_else(|| RetrievalError::ColumnNotFound {
            table: table.to_string(),
            column: name.to_string(),
        })
}

fn parse_metadata(
    column: Option<&std::sync::Arc<dyn Array>>,
    i: usize,
) -> Value {
    let Some(col) = column else {
        return Value::Null;
    };
    let Some(arr) = col.as_any().downcast_ref::<StringArray>() else {
        return Value::Null;
    };
    if arr.is_null(i) {
        return Value::Null;
    }
    serde_json::from_str(arr.value(i)).unwrap_or(Value::Null)
}

use crate::schema::{CONTENT_COLUMN, ID_COLUMN, METADATA_COLUMN, TOOL_NAME_COLUMN};

/// Tunable scanner options for vector search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Optional SQL-like Lance filter (e.g. `skill_name = 'git'`).
    /// When scalar indices exist on the filtered columns, Lance can reduce
    /// rows before/during ANN.
    pub where_filter: Option<String>,
    /// Scanner batch size.
    pub batch_size: Option<usize>,
    /// Number of fragments to prefetch.
    pub fragment_readahead: Option<usize>,
    /// Number of batches to prefetch.
    pub batch_readahead: Option<usize>,
    /// Optional scan-level limit (defaults to the ANN fetch count).
    pub scan_limit: Option<usize>,
    /// Projected columns for scan I/O. Must not be empty.
    pub projected_columns: Vec<&'static str>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            where_filter: None,
            batch_size: Some(1024),
            fragment_readahead: Some(4),
            batch_readahead: Some(16),
            scan_limit: None,
            projected_columns: vec![ID_COLUMN, CONTENT_COLUMN, TOOL_NAME_COLUMN, METADATA_COLUMN],
        }
    }
}

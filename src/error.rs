//! Error types for retrieval store operations.

pub use lance::deps::arrow_schema::ArrowError;
use thiserror::Error;
use tokio::task::JoinError;

/// Errors for retrieval store operations.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tokio task join error
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),

    /// Lance error
    #[error("Lance error: {0}")]
    Lance(#[from] lance::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Tantivy error (keyword search)
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    /// Table not found
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Column not found on a table where it is required
    #[error("Column '{column}' not found on table '{table}'")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Missing column name.
        column: String,
    },

    /// Query vector length does not match the table's embedding dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured store dimension.
        expected: usize,
        /// Supplied vector length.
        actual: usize,
    },

    /// Invalid per-call configuration (empty projection, zero limit, ...)
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// A strategy requested an index that does not exist on the table.
    /// Recovered internally for Exact-intent fallback; never surfaced there.
    #[error("Index unavailable on table '{table}': {index}")]
    IndexUnavailable {
        /// Table name.
        table: String,
        /// Which index was required (e.g. "keyword").
        index: String,
    },

    /// Read path encountered a physical encoding it cannot interpret
    #[error("Migration incomplete on table '{table}': column '{column}' has unsupported encoding")]
    MigrationIncomplete {
        /// Table name.
        table: String,
        /// Offending column.
        column: String,
    },

    /// General error with message
    #[error("{0}")]
    General(String),
}

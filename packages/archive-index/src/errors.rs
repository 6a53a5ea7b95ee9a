//! Error types for archive-index
//!
//! Provides unified error handling across the index, query and sync layers.

use archive_manifest::StorageError;
use thiserror::Error;

/// Main error type for index and query operations
#[derive(Debug, Error)]
pub enum IndexError {
    /// Index location is corrupt, locked by another writer, or inaccessible
    #[error("Failed to open index at {location}: {message}")]
    Open { location: String, message: String },

    /// Operation on an engine after `close()`
    #[error("Index is closed")]
    Closed,

    /// Malformed query text (unbalanced quotes, invalid field reference)
    #[error("Query syntax error near '{token}': {message}")]
    QuerySyntax { token: String, message: String },

    /// Sort requested on a field the schema does not have
    #[error("Invalid sort field '{0}'")]
    InvalidSortField(String),

    /// Tantivy error (write, commit, search)
    #[error("Index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    /// Manifest error surfaced through the sync layer
    #[error("Manifest error: {0}")]
    Storage(#[from] StorageError),
}

impl IndexError {
    pub fn open(location: impl Into<String>, message: impl ToString) -> Self {
        IndexError::Open {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn query_syntax(token: impl Into<String>, message: impl Into<String>) -> Self {
        IndexError::QuerySyntax {
            token: token.into(),
            message: message.into(),
        }
    }

    /// Errors the caller fixes by changing its input.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            IndexError::QuerySyntax { .. } | IndexError::InvalidSortField(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, IndexError::Storage(e) if e.is_not_found())
    }
}

/// Result type alias for index operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// A rebuild that stopped on an error.
///
/// `committed` documents are durable in the index; the failed batch was
/// rolled back.
#[derive(Debug, Error)]
#[error("Rebuild failed after {committed} committed documents: {error}")]
pub struct RebuildFailure {
    pub committed: u64,
    #[source]
    pub error: IndexError,
}

//! Error types for archive-manifest

use std::fmt;
use thiserror::Error;

/// Storage error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// SQLite errors (open, query, write)
    Database,
    /// Referenced record does not exist
    NotFound,
    /// Filesystem errors around the manifest file
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Database => "database",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StorageError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    /// No record with the given id.
    pub fn record_not_found(id: i64) -> Self {
        Self::new(ErrorKind::NotFound, format!("File record not found: id={}", id))
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::database(format!("SQLite error: {}", err)).with_source(err)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::io(format!("I/O error: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = StorageError::record_not_found(42);
        let msg = format!("{}", err);
        assert!(msg.contains("[not_found]"));
        assert!(msg.contains("id=42"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_database_error() {
        let err = StorageError::database("disk I/O error");
        assert_eq!(err.kind, ErrorKind::Database);
        assert!(err.source.is_none());
        assert!(!err.is_not_found());
        assert_eq!(format!("{}", err), "[database] disk I/O error");
    }

    #[test]
    fn test_io_conversion_keeps_source() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume");
        let err: StorageError = io_err.into();

        assert_eq!(err.kind, ErrorKind::Io);
        let source = err.source().unwrap();
        assert!(source.to_string().contains("read-only volume"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_from_rusqlite_error() {
        let err: StorageError = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(err.kind, ErrorKind::Database);
        assert!(err.message.contains("SQLite error"));
        assert!(err.source.is_some());
    }

    #[test]
    fn test_error_kind_as_str() {
        assert_eq!(ErrorKind::Database.as_str(), "database");
        assert_eq!(ErrorKind::NotFound.as_str(), "not_found");
        assert_eq!(ErrorKind::Io.as_str(), "io");
    }
}

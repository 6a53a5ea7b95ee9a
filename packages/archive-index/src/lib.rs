/*
 * Archive Index - Search over the archive manifest
 *
 * Feature-First Layout:
 * - features/lexical/ : Tantivy index engine + query router
 * - features/sync/    : manifest → index synchronization
 * - config/           : YAML v1 + environment configuration
 * - errors            : IndexError / RebuildFailure
 *
 * The manifest (archive-manifest) is authoritative; everything here is a
 * rebuildable projection of it.
 */

#![allow(clippy::new_without_default)] // Default impl not always needed

/// Configuration (YAML v1, environment overrides)
pub mod config;

/// Error types
pub mod errors;

/// Feature modules (lexical index, sync)
pub mod features;

// Re-exports
pub use config::{ArchiveConfig, ConfigError, ConfigResult};
pub use errors::{IndexError, RebuildFailure, Result};
pub use features::lexical::{
    CancelFlag, IndexDocument, IndexField, IndexOptions, IndexStats, LexicalIndex, QueryRouter,
    RebuildOptions, RebuildReport, SearchRequest, SearchResponse, SearchResult,
};
pub use features::sync::ManifestSync;

pub use archive_manifest::{FileRecord, ManifestStats, ManifestStore, SqliteManifest, StorageError};

//! Domain layer for the file manifest
//!
//! # Core Principles
//!
//! 1. **Single Source of Truth**: the manifest owns every file's metadata and
//!    processing/upload status. Search indexes are derived from it.
//! 2. **Path Identity**: `path` is the natural unique key, `id` is a stable
//!    surrogate assigned on first insert and never reused.
//! 3. **Narrow Mutations**: scanning replaces scan fields, status updates touch
//!    only status fields.
//!
//! # Domain Models
//!
//! - `FileRecord`: one scanned file or directory
//! - `ManifestStats`: aggregate counts for operational reporting
//!
//! # Port Trait
//!
//! - `ManifestStore`: primary storage abstraction

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;

use crate::Result;

// ═══════════════════════════════════════════════════════════════════════════
// Domain Models
// ═══════════════════════════════════════════════════════════════════════════

/// A file or directory observed by the scanner.
///
/// # Identity
///
/// - `id`: assigned by the store on first insert (`0` for records that have
///   not been stored yet)
/// - `path`: absolute path, unique across the manifest
///
/// # Examples
///
/// ```rust
/// use archive_manifest::domain::FileRecord;
/// use chrono::Utc;
///
/// let record = FileRecord::new("/archive/docs/report.pdf", "docs/report.pdf", 2048, Utc::now(), false)
///     .with_content_type("application/pdf");
/// assert_eq!(record.id, 0);
/// assert!(!record.processed);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Stable identity (0 until stored)
    pub id: i64,
    /// Absolute path
    pub path: String,
    /// Path relative to the scanned root
    pub relative_path: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time
    pub mod_time: DateTime<Utc>,
    pub is_dir: bool,
    /// Detected MIME type, empty when undetected
    #[serde(default)]
    pub content_type: String,
    /// Hex digest, empty for directories and oversized files
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub processed: bool,
    /// Remote location, empty until upload completes
    #[serde(default)]
    pub uploaded_url: String,
    #[serde(default)]
    pub upload_time: Option<DateTime<Utc>>,
    /// Content summary, empty until summarization completes
    #[serde(default)]
    pub summary: String,
}

impl FileRecord {
    /// Create an unprocessed record with the scan fields filled in.
    pub fn new(
        path: impl Into<String>,
        relative_path: impl Into<String>,
        size: u64,
        mod_time: DateTime<Utc>,
        is_dir: bool,
    ) -> Self {
        Self {
            id: 0,
            path: path.into(),
            relative_path: relative_path.into(),
            size,
            mod_time,
            is_dir,
            content_type: String::new(),
            sha256: String::new(),
            processed: false,
            uploaded_url: String::new(),
            upload_time: None,
            summary: String::new(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = sha256.into();
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_uploaded_url(mut self, url: impl Into<String>) -> Self {
        self.uploaded_url = url.into();
        self
    }

    /// Has the upload collaborator finished with this file?
    pub fn is_uploaded(&self) -> bool {
        !self.uploaded_url.is_empty()
    }
}

/// Aggregate manifest counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestStats {
    /// Non-directory records
    pub total_files: u64,
    pub total_dirs: u64,
    /// Non-directory records with `processed = true`
    pub processed_files: u64,
    /// Sum of non-directory sizes
    pub total_size_bytes: u64,
}

// ═══════════════════════════════════════════════════════════════════════════
// Port Trait
// ═══════════════════════════════════════════════════════════════════════════

/// File manifest storage abstraction.
///
/// # Core Operations
///
/// 1. **Ingestion**
///    - `upsert`: insert or replace-by-path (scanner)
///    - `update_status`: processed/uploaded/summary (uploader, summarizer)
///
/// 2. **Lookups**
///    - `get_by_path`, `get_by_id`: absence is `Ok(None)`, never an error
///
/// 3. **Listings** (all ordered by `path`)
///    - `list_unprocessed`, `list_by_content_type_prefix`, `list_under_directory`
///
/// 4. **Replay**
///    - `for_each_record`: ordered-by-id streaming for index rebuilds
///
/// Implementations must serialize writes so that updates to the same `id`
/// are linearizable.
pub trait ManifestStore: Send + Sync {
    /// Insert `record`, or replace the scan fields of the record with the same
    /// path. Returns the stable id.
    fn upsert(&self, record: &FileRecord) -> Result<i64>;

    fn get_by_path(&self, path: &str) -> Result<Option<FileRecord>>;

    fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>>;

    /// Non-directory records with `processed = false`.
    fn list_unprocessed(&self) -> Result<Vec<FileRecord>>;

    /// Non-directory records whose content type starts with `prefix`.
    fn list_by_content_type_prefix(&self, prefix: &str) -> Result<Vec<FileRecord>>;

    /// Every record lexically below `dir_path` (the directory itself excluded).
    fn list_under_directory(&self, dir_path: &str) -> Result<Vec<FileRecord>>;

    /// Set status fields and stamp `upload_time = now`.
    ///
    /// Fails with a `NotFound` error when `id` does not exist.
    fn update_status(&self, id: i64, processed: bool, uploaded_url: &str, summary: &str)
        -> Result<()>;

    fn stats(&self) -> Result<ManifestStats>;

    /// Number of records (files and directories).
    fn count(&self) -> Result<u64>;

    /// Visit every record in `id` order from a single consistent read.
    ///
    /// Returns the number of records handed to `visit`. Iteration stops early
    /// when `visit` returns `ControlFlow::Break`.
    fn for_each_record(
        &self,
        visit: &mut dyn FnMut(FileRecord) -> ControlFlow<()>,
    ) -> Result<u64>;
}

//! Archive Manifest - durable record of every scanned file
//!
//! ## Core Principles
//!
//! 1. **Authoritative**: the manifest is the source of truth for file metadata
//!    and processing/upload status. Search indexes are disposable projections.
//! 2. **Path Identity**: one record per absolute path; the numeric id is stable.
//! 3. **Idempotent Ingestion**: re-scanning the same tree re-upserts the same
//!    rows without duplicating them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use archive_manifest::{FileRecord, ManifestStore, SqliteManifest};
//!
//! let manifest = SqliteManifest::open("state/archive.db")?;
//!
//! // Scanner
//! let id = manifest.upsert(&FileRecord::new("/data/a.txt", "a.txt", 100, mod_time, false))?;
//!
//! // Uploader / summarizer
//! manifest.update_status(id, true, "https://bucket/a.txt", "quarterly finance notes")?;
//!
//! // Pipelines
//! for record in manifest.list_unprocessed()? {
//!     // ...
//! }
//! ```

pub mod domain;
pub mod error;

#[cfg(feature = "sqlite")]
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{FileRecord, ManifestStats, ManifestStore};

#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteManifest;

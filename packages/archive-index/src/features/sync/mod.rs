//! Manifest → index synchronization
//!
//! The manifest is authoritative; every mutation that changes a searchable
//! field must be followed by an index update for the same id. `ManifestSync`
//! pairs a store with an engine and applies that rule for the common flows:
//!
//! | Flow | Manifest | Index |
//! |------|----------|-------|
//! | scanner | `upsert` | `update` |
//! | uploader / summarizer | `update_status` | `update` |
//! | directory refresh | `list_under_directory` | `update` per record |
//! | pruning (external) | - | `remove` |
//! | recovery | `for_each_record` | `rebuild` |
//!
//! The manifest write commits first; if the index step then fails, the
//! error is returned and a later `rebuild` restores parity.

use archive_manifest::{FileRecord, ManifestStore, StorageError};
use tracing::debug;

use crate::errors::{RebuildFailure, Result};
use crate::features::lexical::{LexicalIndex, RebuildOptions, RebuildReport};

/// A manifest and the index derived from it.
pub struct ManifestSync<'a, M: ManifestStore> {
    manifest: &'a M,
    index: &'a LexicalIndex,
}

impl<'a, M: ManifestStore> ManifestSync<'a, M> {
    pub fn new(manifest: &'a M, index: &'a LexicalIndex) -> Self {
        Self { manifest, index }
    }

    pub fn manifest(&self) -> &'a M {
        self.manifest
    }

    pub fn index(&self) -> &'a LexicalIndex {
        self.index
    }

    /// Upsert a scanned record and index the stored row. Returns its id.
    pub fn ingest(&self, record: &FileRecord) -> Result<i64> {
        let id = self.manifest.upsert(record)?;
        let stored = self.reload(id)?;
        self.index.update(&stored)?;
        debug!("Ingested {} (id={})", stored.path, id);
        Ok(id)
    }

    /// Record upload/summary progress and refresh the document.
    ///
    /// Unknown ids fail in the manifest and leave the index untouched.
    pub fn record_status(
        &self,
        id: i64,
        processed: bool,
        uploaded_url: &str,
        summary: &str,
    ) -> Result<()> {
        self.manifest.update_status(id, processed, uploaded_url, summary)?;
        let stored = self.reload(id)?;
        self.index.update(&stored)
    }

    /// Re-index every record under `dir`. Returns the number refreshed.
    pub fn refresh_directory(&self, dir: &str) -> Result<usize> {
        let records = self.manifest.list_under_directory(dir)?;
        for record in &records {
            self.index.update(record)?;
        }
        debug!("Refreshed {} records under {}", records.len(), dir);
        Ok(records.len())
    }

    /// Drop a document whose record was pruned from the manifest.
    pub fn forget(&self, id: i64) -> Result<()> {
        self.index.remove(id)
    }

    /// Regenerate the index from the paired manifest.
    pub fn rebuild(
        &self,
        options: &RebuildOptions,
    ) -> std::result::Result<RebuildReport, RebuildFailure> {
        self.index.rebuild(self.manifest, options)
    }

    fn reload(&self, id: i64) -> Result<FileRecord> {
        Ok(self
            .manifest
            .get_by_id(id)?
            .ok_or_else(|| StorageError::record_not_found(id))?)
    }
}

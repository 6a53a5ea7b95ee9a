//! Tantivy Lexical Index Implementation
//!
//! # Architecture
//!
//! ```text
//! FileRecord → IndexDocument → TantivyDocument → IndexWriter → Tantivy Index
//!      ▲                                                            │
//! ManifestStore (rebuild replay)                    IndexReader (snapshots)
//! ```
//!
//! # Concurrency
//!
//! One `IndexWriter` behind a mutex: `index_one`, `remove`, `update` and
//! `rebuild` are mutually exclusive. Searches use reader snapshots and never
//! take the writer lock. The reader is reloaded after every commit.
//!
//! # Rebuild
//!
//! A delete-all is staged together with the first batch, so the old index
//! stays visible until the first batch commits. A failed or cancelled rebuild
//! rolls back the in-flight batch; the index then reflects exactly the
//! committed batches.

use archive_manifest::{FileRecord, ManifestStore};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tantivy::collector::Count;
use tantivy::query::{AllQuery, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, Term};
use tracing::{debug, info, warn};

use crate::errors::{IndexError, RebuildFailure, Result};
use crate::features::lexical::document::IndexDocument;
use crate::features::lexical::schema::{build_schema, IndexField, SchemaFields};

/// Documents per rebuild commit.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Writer heap (tantivy requires at least 15MB).
pub const DEFAULT_WRITER_HEAP_BYTES: usize = 50_000_000;

/// Engine options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    /// Carry record summaries into the `Summary` field
    pub index_summaries: bool,
    pub writer_heap_bytes: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            index_summaries: true,
            writer_heap_bytes: DEFAULT_WRITER_HEAP_BYTES,
        }
    }
}

/// Cooperative cancellation for long rebuilds.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Rebuild options.
#[derive(Debug, Clone)]
pub struct RebuildOptions {
    pub batch_size: usize,
    pub cancel: Option<CancelFlag>,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            cancel: None,
        }
    }
}

impl RebuildOptions {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }
}

/// Outcome of a rebuild that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Documents committed
    pub documents: u64,
    /// Non-empty batches committed
    pub batches: u64,
    /// Stopped by the caller's `CancelFlag`
    pub cancelled: bool,
    pub duration_ms: u64,
}

/// Per-engine counters. Owned by one `LexicalIndex`, updated under one lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub documents_indexed: u64,
    pub documents_removed: u64,
    pub searches: u64,
    pub rebuilds: u64,
    pub last_rebuild_documents: u64,
    pub last_rebuild_ms: u64,
}

/// Tantivy-backed file index.
pub struct LexicalIndex {
    location: PathBuf,
    index: Index,
    reader: IndexReader,
    /// `None` once closed
    writer: Mutex<Option<IndexWriter>>,
    fields: SchemaFields,
    options: IndexOptions,
    closed: AtomicBool,
    stats: Mutex<IndexStats>,
}

impl LexicalIndex {
    /// Open the index at `location`, creating an empty one if none exists.
    pub fn open(location: impl AsRef<Path>, options: IndexOptions) -> Result<Self> {
        let location = location.as_ref();
        let location_str = location.display().to_string();

        let index = if location.join("meta.json").exists() {
            Index::open_in_dir(location).map_err(|e| IndexError::open(&location_str, e))?
        } else {
            std::fs::create_dir_all(location).map_err(|e| IndexError::open(&location_str, e))?;
            info!("Creating new index at {}", location_str);
            Index::create_in_dir(location, build_schema())
                .map_err(|e| IndexError::open(&location_str, e))?
        };

        let fields = SchemaFields::from_schema(&index.schema()).map_err(|msg| {
            IndexError::open(&location_str, format!("{}; delete the index and rebuild", msg))
        })?;

        let writer: IndexWriter = index
            .writer(options.writer_heap_bytes)
            .map_err(|e| IndexError::open(&location_str, e))?;

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e: tantivy::TantivyError| IndexError::open(&location_str, e))?;

        info!(
            "Opened index at {} ({} documents)",
            location_str,
            reader.searcher().num_docs()
        );

        Ok(Self {
            location: location.to_path_buf(),
            index,
            reader,
            writer: Mutex::new(Some(writer)),
            fields,
            options,
            closed: AtomicBool::new(false),
            stats: Mutex::new(IndexStats::default()),
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn options(&self) -> IndexOptions {
        self.options
    }

    /// Index (or re-index) a single record, keyed by its id.
    pub fn index_one(&self, record: &FileRecord) -> Result<()> {
        let doc = IndexDocument::from_record(record, self.options.index_summaries, Utc::now());
        let id = self.id_term(&doc.id);
        let tantivy_doc = doc.to_tantivy(&self.fields);
        self.with_writer(|writer| {
            writer.delete_term(id);
            writer.add_document(tantivy_doc)?;
            self.commit(writer)
        })?;

        self.stats.lock().documents_indexed += 1;
        debug!("Indexed {} (id={})", record.path, record.id);
        Ok(())
    }

    /// Delete the document for `id`. Absent ids are a no-op.
    pub fn remove(&self, id: i64) -> Result<()> {
        let term = self.id_term(&id.to_string());
        let removed = self.with_writer(|writer| {
            // Checked under the writer lock, so no commit can race the count
            let live = self
                .reader
                .searcher()
                .search(&TermQuery::new(term.clone(), IndexRecordOption::Basic), &Count)?;
            if live == 0 {
                return Ok(false);
            }
            writer.delete_term(term);
            self.commit(writer)?;
            Ok(true)
        })?;

        if removed {
            self.stats.lock().documents_removed += 1;
            debug!("Removed id={} from index", id);
        }
        Ok(())
    }

    /// Replace the document for `record.id` in one commit.
    ///
    /// Works the same for never-indexed and previously-indexed records.
    pub fn update(&self, record: &FileRecord) -> Result<()> {
        self.index_one(record)
    }

    /// Regenerate the whole index by replaying `source`.
    pub fn rebuild(
        &self,
        source: &dyn ManifestStore,
        options: &RebuildOptions,
    ) -> std::result::Result<RebuildReport, RebuildFailure> {
        let start = Instant::now();
        let batch_size = options.batch_size.max(1);
        let fail = |committed, error| RebuildFailure { committed, error };

        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or_else(|| fail(0, IndexError::Closed))?;

        info!(
            "Rebuilding index at {} (batch size {})",
            self.location.display(),
            batch_size
        );

        // Applied with the first commit; later adds have newer opstamps and survive it.
        writer
            .delete_query(Box::new(AllQuery))
            .map_err(|e| fail(0, e.into()))?;

        let indexed_at = Utc::now();
        let mut pending: Vec<FileRecord> = Vec::with_capacity(batch_size);
        let mut committed = 0u64;
        let mut batches = 0u64;
        let mut cancelled = false;
        let mut failure: Option<IndexError> = None;

        let scanned = source.for_each_record(&mut |record: FileRecord| {
            if options.is_cancelled() {
                cancelled = true;
                return ControlFlow::Break(());
            }
            pending.push(record);
            if pending.len() >= batch_size {
                match self.write_batch(writer, &pending, indexed_at) {
                    Ok(written) => {
                        committed += written;
                        batches += 1;
                        pending.clear();
                        debug!("Rebuild batch {} committed ({} total)", batches, committed);
                    }
                    Err(e) => {
                        failure = Some(e);
                        return ControlFlow::Break(());
                    }
                }
            }
            ControlFlow::Continue(())
        });

        if let Err(e) = scanned {
            failure.get_or_insert(IndexError::Storage(e));
        }

        if failure.is_none() && !cancelled {
            // Final partial batch; also commits the delete-all for an empty manifest.
            let non_empty = !pending.is_empty();
            match self.write_batch(writer, &pending, indexed_at) {
                Ok(written) => {
                    committed += written;
                    if non_empty {
                        batches += 1;
                    }
                }
                Err(e) => failure = Some(e),
            }
        }

        if failure.is_some() || cancelled {
            if let Err(e) = writer.rollback() {
                warn!("Rollback after interrupted rebuild failed: {}", e);
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        {
            let mut stats = self.stats.lock();
            stats.rebuilds += 1;
            stats.documents_indexed += committed;
            stats.last_rebuild_documents = committed;
            stats.last_rebuild_ms = duration_ms;
        }

        if let Some(error) = failure {
            warn!(
                "Rebuild failed after {} committed documents: {}",
                committed, error
            );
            return Err(fail(committed, error));
        }

        if cancelled {
            warn!("Rebuild cancelled after {} committed documents", committed);
        } else {
            info!(
                "Rebuilt index: {} documents in {} batches ({}ms)",
                committed, batches, duration_ms
            );
        }

        Ok(RebuildReport {
            documents: committed,
            batches,
            cancelled,
            duration_ms,
        })
    }

    /// Exact number of live documents.
    pub fn document_count(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.reader.searcher().num_docs())
    }

    pub fn stats(&self) -> IndexStats {
        self.stats.lock().clone()
    }

    /// Release the writer. Every later call fails with `IndexError::Closed`.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(IndexError::Closed);
        }
        if let Some(writer) = self.writer.lock().take() {
            writer.wait_merging_threads()?;
        }
        info!("Closed index at {}", self.location.display());
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(IndexError::Closed);
        }
        Ok(())
    }

    pub(crate) fn searcher(&self) -> Result<Searcher> {
        self.ensure_open()?;
        Ok(self.reader.searcher())
    }

    pub(crate) fn index(&self) -> &Index {
        &self.index
    }

    pub(crate) fn fields(&self) -> &SchemaFields {
        &self.fields
    }

    pub(crate) fn record_search(&self) {
        self.stats.lock().searches += 1;
    }

    fn id_term(&self, id: &str) -> Term {
        Term::from_field_text(self.fields.field(IndexField::Id), id)
    }

    /// Run `op` under the writer lock. Anything it staged is rolled back if
    /// it fails, so a later commit never applies half an operation.
    fn with_writer<T>(&self, op: impl FnOnce(&mut IndexWriter) -> Result<T>) -> Result<T> {
        self.ensure_open()?;
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(IndexError::Closed)?;
        let result = op(writer);
        if result.is_err() {
            if let Err(rollback) = writer.rollback() {
                warn!("Rollback after failed write failed: {}", rollback);
            }
        }
        result
    }

    /// Commit staged operations and refresh the reader.
    fn commit(&self, writer: &mut IndexWriter) -> Result<()> {
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    fn write_batch(
        &self,
        writer: &mut IndexWriter,
        records: &[FileRecord],
        indexed_at: DateTime<Utc>,
    ) -> Result<u64> {
        let index_summaries = self.options.index_summaries;
        let documents: Vec<_> = records
            .par_iter()
            .map(|record| {
                IndexDocument::from_record(record, index_summaries, indexed_at).to_tantivy(&self.fields)
            })
            .collect();

        for doc in documents {
            writer.add_document(doc)?;
        }
        writer.commit()?;
        self.reader.reload()?;
        Ok(records.len() as u64)
    }
}

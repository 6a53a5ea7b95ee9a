//! Query Router - Search Interface
//!
//! # Design
//!
//! ```text
//! SearchRequest → QueryRouter → build_query → Tantivy (BM25)
//!                                                 │
//!                      fast columns → sort → paginate → stored docs → snippets
//!                                                 │
//!                                          SearchResponse
//! ```
//!
//! # Ordering
//!
//! Every hit is collected and ordered here rather than by the collector, so
//! ties resolve the same way on every call:
//! - with `sort_field`: that field's natural order, then score desc, then id asc
//! - without: score desc, then id asc
//!
//! Ids compare numerically. Ids and the `Size`/`ModTime`/`IndexedAt`/`IsDir`
//! keys come from fast columns; only text sort keys read the doc store for
//! every hit. Stored documents are otherwise loaded for the page alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tantivy::collector::TopDocs;
use tantivy::columnar::{Column, StrColumn};
use tantivy::{DocAddress, DocId, Searcher, SegmentReader, SnippetGenerator, TantivyDocument};
use tracing::debug;

use crate::errors::{IndexError, Result};
use crate::features::lexical::document::{to_tantivy_date, IndexDocument};
use crate::features::lexical::query::build_query;
use crate::features::lexical::schema::{FieldKind, IndexField, SchemaFields};
use crate::features::lexical::tantivy_index::LexicalIndex;

/// Page size used when a request asks for 0 results.
pub const DEFAULT_LIMIT: usize = 10;

/// Plain excerpt length when nothing is highlighted.
const EXCERPT_CHARS: usize = 150;

/// Search request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query text; empty matches everything
    pub query: String,

    /// Restrict the query to one field
    pub field: Option<String>,

    /// Page size (0 → `DEFAULT_LIMIT`)
    pub limit: usize,

    pub offset: usize,

    pub sort_field: Option<String>,

    pub sort_descending: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort_field = Some(field.into());
        self.sort_descending = descending;
        self
    }

    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            DEFAULT_LIMIT
        } else {
            self.limit
        }
    }
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub path: String,
    pub score: f32,
    /// HTML with `<b>` highlights, or a plain excerpt
    pub snippet: String,
    pub is_dir: bool,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    pub metadata: IndexDocument,
}

/// Search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The requested page
    pub hits: Vec<SearchResult>,

    /// Matches before pagination
    pub total_hits: usize,

    /// Search latency (ms)
    pub latency_ms: u64,
}

/// Value a hit is ordered by. One search only ever compares one variant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Unsorted,
    Id(i64),
    U64(u64),
    Date(tantivy::DateTime),
    Bool(bool),
    Text(String),
}

struct Candidate {
    score: f32,
    address: DocAddress,
    id: i64,
    key: SortKey,
    /// Loaded early only when a key had to come from the doc store
    stored: Option<TantivyDocument>,
}

/// Query router over a `LexicalIndex`.
pub struct QueryRouter {
    lexical_index: Arc<LexicalIndex>,
}

impl QueryRouter {
    pub fn new(lexical_index: Arc<LexicalIndex>) -> Self {
        Self { lexical_index }
    }

    pub fn index(&self) -> &LexicalIndex {
        &self.lexical_index
    }

    /// Execute a search request.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let start = Instant::now();
        let index = &*self.lexical_index;

        let sort_field = request
            .sort_field
            .as_deref()
            .map(|name| {
                IndexField::from_name(name)
                    .ok_or_else(|| IndexError::InvalidSortField(name.to_string()))
            })
            .transpose()?;

        let searcher = index.searcher()?;
        let fields = index.fields();
        let built = build_query(index.index(), fields, &request.query, request.field.as_deref())?;

        // 1. Collect every hit with its sort keys
        let limit = (searcher.num_docs() as usize).max(1);
        let top_docs = searcher.search(&*built.query, &TopDocs::with_limit(limit))?;
        let scores = top_docs.into_iter().map(|(score, address)| {
            (if built.match_all { 0.0 } else { score }, address)
        });
        let mut candidates = collect_candidates(&searcher, fields, scores, sort_field)?;
        let total_hits = candidates.len();

        // 2. Order
        candidates.sort_by(|a, b| {
            let natural = a.key.cmp(&b.key);
            let primary = if request.sort_descending {
                natural.reverse()
            } else {
                natural
            };
            primary
                .then_with(|| b.score.total_cmp(&a.score))
                .then_with(|| a.id.cmp(&b.id))
        });

        // 3. Paginate, load and highlight
        let snippets = Snippets::new(&searcher, &*built.query, fields, built.match_all)?;
        let mut hits = Vec::with_capacity(request.effective_limit().min(total_hits));
        for mut candidate in candidates
            .into_iter()
            .skip(request.offset)
            .take(request.effective_limit())
        {
            let stored = load(&searcher, candidate.address, &mut candidate.stored)?;
            let doc = IndexDocument::from_tantivy(stored, fields);
            hits.push(SearchResult {
                id: doc.id.clone(),
                path: doc.path.clone(),
                score: candidate.score,
                snippet: snippets.render(stored, &doc),
                is_dir: doc.is_dir,
                size: doc.size,
                mod_time: doc.mod_time,
                metadata: doc,
            });
        }

        index.record_search();
        let latency_ms = start.elapsed().as_millis() as u64;
        debug!(
            "Search '{}' → {} hits ({} on page) in {}ms",
            request.query,
            total_hits,
            hits.len(),
            latency_ms
        );

        Ok(SearchResponse {
            hits,
            total_hits,
            latency_ms,
        })
    }
}

/// Resolve the id and sort key of every hit.
fn collect_candidates(
    searcher: &Searcher,
    fields: &SchemaFields,
    hits: impl IntoIterator<Item = (f32, DocAddress)>,
    sort_field: Option<IndexField>,
) -> Result<Vec<Candidate>> {
    let columns: Vec<SegmentColumns> = searcher
        .segment_readers()
        .iter()
        .map(|reader| SegmentColumns::open(reader, sort_field))
        .collect();

    let mut candidates = Vec::new();
    for (score, address) in hits {
        let segment = &columns[address.segment_ord as usize];
        let mut stored = None;

        let id = match segment.id(address.doc_id)? {
            Some(id) => id,
            None => IndexDocument::from_tantivy(load(searcher, address, &mut stored)?, fields)
                .numeric_id(),
        };

        let key = match sort_field {
            None => SortKey::Unsorted,
            Some(IndexField::Id) => SortKey::Id(id),
            Some(field) => match segment.sort_key(address.doc_id) {
                Some(key) => key,
                None => {
                    let doc = IndexDocument::from_tantivy(load(searcher, address, &mut stored)?, fields);
                    stored_sort_key(&doc, field)
                }
            },
        };

        candidates.push(Candidate {
            score,
            address,
            id,
            key,
            stored,
        });
    }
    Ok(candidates)
}

/// Read a stored document once per candidate.
fn load<'a>(
    searcher: &Searcher,
    address: DocAddress,
    slot: &'a mut Option<TantivyDocument>,
) -> Result<&'a TantivyDocument> {
    let doc = match slot.take() {
        Some(doc) => doc,
        None => searcher.doc(address)?,
    };
    Ok(slot.insert(doc))
}

/// Fast columns of one segment. A missing column (an index written before
/// the column existed) falls back to the doc store.
struct SegmentColumns {
    id: Option<StrColumn>,
    sort: Option<SortColumn>,
}

enum SortColumn {
    U64(Column<u64>),
    Date(Column<tantivy::DateTime>),
    Bool(Column<bool>),
}

impl SegmentColumns {
    fn open(reader: &SegmentReader, sort_field: Option<IndexField>) -> Self {
        let fast = reader.fast_fields();
        let id = fast.str(IndexField::Id.name()).ok().flatten();
        let sort = sort_field.and_then(|field| match field.kind() {
            FieldKind::U64 => fast.u64(field.name()).ok().map(SortColumn::U64),
            FieldKind::Date => fast.date(field.name()).ok().map(SortColumn::Date),
            FieldKind::Bool => fast.bool(field.name()).ok().map(SortColumn::Bool),
            FieldKind::Text | FieldKind::Keyword => None,
        });
        Self { id, sort }
    }

    fn id(&self, doc: DocId) -> Result<Option<i64>> {
        let Some(column) = &self.id else {
            return Ok(None);
        };
        let Some(ord) = column.term_ords(doc).next() else {
            return Ok(None);
        };
        let mut id = String::new();
        column
            .ord_to_str(ord, &mut id)
            .map_err(tantivy::TantivyError::from)?;
        Ok(Some(id.parse().unwrap_or(i64::MAX)))
    }

    fn sort_key(&self, doc: DocId) -> Option<SortKey> {
        match self.sort.as_ref()? {
            SortColumn::U64(column) => column.first(doc).map(SortKey::U64),
            SortColumn::Date(column) => column.first(doc).map(SortKey::Date),
            SortColumn::Bool(column) => column.first(doc).map(SortKey::Bool),
        }
    }
}

/// Natural order of one field, read from a stored document.
fn stored_sort_key(doc: &IndexDocument, field: IndexField) -> SortKey {
    match field {
        IndexField::Id => SortKey::Id(doc.numeric_id()),
        IndexField::Path => SortKey::Text(doc.path.clone()),
        IndexField::RelativePath => SortKey::Text(doc.relative_path.clone()),
        IndexField::Name => SortKey::Text(doc.name.clone()),
        IndexField::Extension => SortKey::Text(doc.extension.clone()),
        IndexField::Size => SortKey::U64(doc.size),
        IndexField::ModTime => SortKey::Date(to_tantivy_date(doc.mod_time)),
        IndexField::IsDir => SortKey::Bool(doc.is_dir),
        IndexField::ContentType => SortKey::Text(doc.content_type.clone()),
        IndexField::Summary => SortKey::Text(doc.summary.clone().unwrap_or_default()),
        IndexField::UploadedUrl => SortKey::Text(doc.uploaded_url.clone()),
        IndexField::IndexedAt => SortKey::Date(to_tantivy_date(doc.indexed_at)),
    }
}

/// Highlighters for `Summary` then `Path`.
struct Snippets {
    generators: Vec<SnippetGenerator>,
}

impl Snippets {
    fn new(
        searcher: &Searcher,
        query: &dyn tantivy::query::Query,
        fields: &SchemaFields,
        match_all: bool,
    ) -> Result<Self> {
        let mut generators = Vec::new();
        if !match_all {
            for field in [IndexField::Summary, IndexField::Path] {
                let mut generator = SnippetGenerator::create(searcher, query, fields.field(field))?;
                generator.set_max_num_chars(EXCERPT_CHARS);
                generators.push(generator);
            }
        }
        Ok(Self { generators })
    }

    fn render(&self, stored: &TantivyDocument, doc: &IndexDocument) -> String {
        for generator in &self.generators {
            let snippet = generator.snippet_from_doc(stored);
            if !snippet.highlighted().is_empty() {
                return snippet.to_html();
            }
        }
        plain_excerpt(doc.summary.as_deref().unwrap_or(&doc.path))
    }
}

fn plain_excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::lexical::tantivy_index::IndexOptions;
    use archive_manifest::FileRecord;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(id: i64, path: &str, summary: &str) -> FileRecord {
        let mut record = FileRecord::new(
            path,
            path.trim_start_matches('/'),
            id as u64 * 1024,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::days(id),
            false,
        )
        .with_summary(summary);
        record.id = id;
        record
    }

    fn setup(records: &[FileRecord]) -> (TempDir, QueryRouter) {
        let temp = TempDir::new().unwrap();
        let index = LexicalIndex::open(temp.path().join("index"), IndexOptions::default()).unwrap();
        for record in records {
            index.index_one(record).unwrap();
        }
        (temp, QueryRouter::new(Arc::new(index)))
    }

    #[test]
    fn test_search_request_builder() {
        let request = SearchRequest::new("finance")
            .with_field("Summary")
            .with_limit(5)
            .with_offset(10)
            .sorted_by("Size", true);

        assert_eq!(request.query, "finance");
        assert_eq!(request.field.as_deref(), Some("Summary"));
        assert_eq!(request.effective_limit(), 5);
        assert_eq!(request.offset, 10);
        assert!(request.sort_descending);
        assert_eq!(SearchRequest::new("x").effective_limit(), DEFAULT_LIMIT);
    }

    #[test]
    fn test_match_all_scores_zero() {
        let (_temp, router) = setup(&[record(1, "/d/a.txt", ""), record(2, "/d/b.txt", "")]);
        let response = router.search(&SearchRequest::new("")).unwrap();
        assert_eq!(response.total_hits, 2);
        assert!(response.hits.iter().all(|hit| hit.score == 0.0));
        // Ties fall back to id order
        assert_eq!(response.hits[0].id, "1");
        assert_eq!(response.hits[1].id, "2");
    }

    #[test]
    fn test_sort_by_size_descending() {
        let (_temp, router) = setup(&[
            record(1, "/d/a.txt", ""),
            record(3, "/d/c.txt", ""),
            record(2, "/d/b.txt", ""),
        ]);
        let response = router
            .search(&SearchRequest::new("").sorted_by("size", true))
            .unwrap();
        let ids: Vec<_> = response.hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[test]
    fn test_numeric_id_tie_break() {
        let (_temp, router) = setup(&[record(10, "/d/x.txt", ""), record(9, "/d/y.txt", "")]);
        let response = router.search(&SearchRequest::new("")).unwrap();
        assert_eq!(response.hits[0].id, "9");
    }

    #[test]
    fn test_fast_sort_keys_skip_doc_store() {
        let (_temp, router) = setup(&[record(2, "/d/b.txt", ""), record(1, "/d/a.txt", "")]);
        let index = router.index();
        let searcher = index.searcher().unwrap();
        let hits = searcher.search(&tantivy::query::AllQuery, &TopDocs::with_limit(10)).unwrap();

        for field in [None, Some(IndexField::Id), Some(IndexField::Size), Some(IndexField::ModTime)] {
            let candidates =
                collect_candidates(&searcher, index.fields(), hits.clone(), field).unwrap();
            assert_eq!(candidates.len(), 2);
            assert!(candidates.iter().all(|c| c.stored.is_none()));
            let mut ids: Vec<_> = candidates.iter().map(|c| c.id).collect();
            ids.sort();
            assert_eq!(ids, vec![1, 2]);
        }

        let by_path =
            collect_candidates(&searcher, index.fields(), hits, Some(IndexField::Path)).unwrap();
        assert!(by_path.iter().all(|c| c.stored.is_some()));
        assert!(by_path
            .iter()
            .any(|c| c.key == SortKey::Text("/d/a.txt".to_string())));
    }

    #[test]
    fn test_ordering_spans_segments() {
        // One commit per record, so each document sits in its own segment
        let (_temp, router) = setup(&[
            record(12, "/d/l.txt", ""),
            record(3, "/d/c.txt", ""),
            record(7, "/d/g.txt", ""),
            record(1, "/d/a.txt", ""),
        ]);

        let by_size = router
            .search(&SearchRequest::new("").sorted_by("Size", false).with_limit(2).with_offset(1))
            .unwrap();
        let ids: Vec<_> = by_size.hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "7"]);
        assert_eq!(by_size.total_hits, 4);
        assert_eq!(by_size.hits[0].path, "/d/c.txt");

        let by_name = router
            .search(&SearchRequest::new("").sorted_by("Name", true))
            .unwrap();
        let ids: Vec<_> = by_name.hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["12", "7", "3", "1"]);
    }

    #[test]
    fn test_invalid_sort_field() {
        let (_temp, router) = setup(&[]);
        let err = router
            .search(&SearchRequest::new("x").sorted_by("Owner", false))
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidSortField(name) if name == "Owner"));
    }

    #[test]
    fn test_offset_beyond_hits_is_empty_page() {
        let (_temp, router) = setup(&[record(1, "/d/a.txt", "")]);
        let response = router.search(&SearchRequest::new("").with_offset(5)).unwrap();
        assert!(response.hits.is_empty());
        assert_eq!(response.total_hits, 1);
    }

    #[test]
    fn test_snippet_prefers_summary_then_path() {
        let (_temp, router) = setup(&[
            record(1, "/d/notes.txt", "quarterly finance notes"),
            record(2, "/d/finance/plan.txt", "budget"),
        ]);
        let response = router.search(&SearchRequest::new("finance")).unwrap();
        assert_eq!(response.total_hits, 2);

        let by_id = |id: &str| response.hits.iter().find(|h| h.id == id).unwrap();
        assert!(by_id("1").snippet.contains("<b>finance</b>"));
        assert!(by_id("2").snippet.contains("<b>finance</b>"));
        assert!(by_id("2").snippet.contains("plan"));
    }

    #[test]
    fn test_plain_excerpt_without_highlight() {
        let (_temp, router) = setup(&[record(1, "/d/a.txt", "budget overview")]);
        let response = router.search(&SearchRequest::new("")).unwrap();
        assert_eq!(response.hits[0].snippet, "budget overview");
    }

    #[test]
    fn test_plain_excerpt_truncates() {
        let long = "x".repeat(400);
        let excerpt = plain_excerpt(&long);
        assert_eq!(excerpt.len(), EXCERPT_CHARS + 3);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn test_searches_counted() {
        let (_temp, router) = setup(&[]);
        router.search(&SearchRequest::new("")).unwrap();
        router.search(&SearchRequest::new("anything")).unwrap();
        assert_eq!(router.index().stats().searches, 2);
    }
}

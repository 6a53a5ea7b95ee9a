//! Lexical Search Index (Native Tantivy Implementation)
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Lexical Search Layer                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  QueryRouter (search, sort, paginate, snippets)             │
//! │    ↓                                                        │
//! │  LexicalIndex (index_one / update / remove / rebuild)       │
//! │    ↓                    ↑                                   │
//! │  Tantivy Index      ManifestStore (rebuild source)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Features
//!
//! - **One document per manifest record**, keyed by the record id
//! - **BM25 Ranking**: default Tantivy similarity
//! - **Field-scoped queries** with each field's own analyzer
//! - **Batched rebuild** that never exposes a half-committed batch
//!
//! # Usage
//!
//! ```text
//! use archive_index::features::lexical::{IndexOptions, LexicalIndex, QueryRouter, SearchRequest};
//!
//! let index = Arc::new(LexicalIndex::open("data/index", IndexOptions::default())?);
//! index.rebuild(&manifest, &RebuildOptions::default())?;
//!
//! let router = QueryRouter::new(index);
//! let response = router.search(&SearchRequest::new("finance").with_limit(20))?;
//! ```

pub mod document;
pub mod query;
pub mod query_router;
pub mod schema;
pub mod tantivy_index;

// Re-exports
pub use document::IndexDocument;
pub use query::{build_query, BuiltQuery};
pub use query_router::{QueryRouter, SearchRequest, SearchResponse, SearchResult, DEFAULT_LIMIT};
pub use schema::{build_schema, FieldKind, IndexField, SchemaFields};
pub use tantivy_index::{
    CancelFlag, IndexOptions, IndexStats, LexicalIndex, RebuildOptions, RebuildReport,
    DEFAULT_BATCH_SIZE, DEFAULT_WRITER_HEAP_BYTES,
};

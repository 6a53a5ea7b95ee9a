//! Feature modules
//!
//! - lexical/ - Tantivy index engine, query construction and routing
//! - sync/    - Keeps the index in step with the manifest

pub mod lexical;

pub mod sync;

//! Custom assertions for search results

use archive_index::{LexicalIndex, SearchResponse};
use archive_manifest::ManifestStore;
use std::collections::HashSet;

/// Ids on the page, in order
pub fn hit_ids(response: &SearchResponse) -> Vec<String> {
    response.hits.iter().map(|hit| hit.id.clone()).collect()
}

/// Assert the page holds exactly these ids, in any order
pub fn assert_hit_set<S: AsRef<str>>(response: &SearchResponse, expected: &[S]) {
    let actual: HashSet<String> = hit_ids(response).into_iter().collect();
    let expected: HashSet<String> = expected.iter().map(|id| id.as_ref().to_string()).collect();
    assert_eq!(actual, expected, "hits: {:?}", hit_ids(response));
}

/// Index document count equals manifest record count
pub fn assert_parity(manifest: &dyn ManifestStore, index: &LexicalIndex) {
    let records = manifest.count().unwrap();
    let documents = index.document_count().unwrap();
    assert_eq!(
        documents, records,
        "index has {documents} documents, manifest has {records} records"
    );
}

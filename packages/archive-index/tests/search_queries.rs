//! Query Engine Integration Tests
//!
//! Tests the search contract end to end:
//! 1. Manifest → index → search with highlighted snippets
//! 2. Field-scoped queries against analyzed and keyword fields
//! 3. Deterministic pagination and sorting
//! 4. Input errors (syntax, sort field)

mod common;

use archive_index::{IndexError, SearchRequest};
use archive_manifest::ManifestStore;
use common::*;
use pretty_assertions::assert_eq;
use std::collections::HashSet;

#[test]
fn test_e2e_index_then_search_with_snippet() {
    let ws = Workspace::new();
    let id = ws.manifest.upsert(&fixture_file("/d/a.txt", 42)).unwrap();
    ws.manifest
        .update_status(id, true, "", "quarterly finance notes")
        .unwrap();
    let record = ws.manifest.get_by_id(id).unwrap().unwrap();
    ws.index.index_one(&record).unwrap();

    let response = ws.router().search(&SearchRequest::new("finance")).unwrap();

    assert_eq!(response.total_hits, 1);
    let hit = &response.hits[0];
    assert_eq!(hit.id, id.to_string());
    assert_eq!(hit.path, "/d/a.txt");
    assert!(hit.snippet.contains("finance"), "snippet: {}", hit.snippet);
    assert!(hit.score > 0.0);
    assert_eq!(hit.metadata.summary.as_deref(), Some("quarterly finance notes"));
}

#[test]
fn test_field_scoping_summary_vs_extension() {
    let ws = Workspace::new();
    let stored = ws.seed_and_index(&[
        fixture_file("/d/notes.md", 10).with_summary("txt export notes"),
        fixture_file("/d/data.txt", 20).with_summary("numbers"),
    ]);
    let notes = stored[0].id.to_string();
    let data = stored[1].id.to_string();
    let router = ws.router();

    let by_summary = router
        .search(&SearchRequest::new("txt").with_field("Summary"))
        .unwrap();
    assert_hit_set(&by_summary, &[&notes]);

    let by_extension = router
        .search(&SearchRequest::new(".txt").with_field("extension"))
        .unwrap();
    assert_hit_set(&by_extension, &[&data]);

    let unscoped = router.search(&SearchRequest::new("txt")).unwrap();
    assert_hit_set(&unscoped, &[&notes, &data]);
}

#[test]
fn test_pagination_is_deterministic_and_disjoint() {
    let ws = Workspace::new();
    ws.seed_and_index(&fixture_numbered_files(15));
    let router = ws.router();

    let first = router
        .search(&SearchRequest::new("").with_limit(10).sorted_by("Path", false))
        .unwrap();
    let second = router
        .search(
            &SearchRequest::new("")
                .with_limit(10)
                .with_offset(10)
                .sorted_by("Path", false),
        )
        .unwrap();

    assert_eq!(first.total_hits, 15);
    assert_eq!(first.hits.len(), 10);
    assert_eq!(second.hits.len(), 5);
    assert_eq!(first.hits[0].path, "/d/file00.txt");
    assert_eq!(second.hits[4].path, "/d/file14.txt");

    let a: HashSet<_> = hit_ids(&first).into_iter().collect();
    let b: HashSet<_> = hit_ids(&second).into_iter().collect();
    assert!(a.is_disjoint(&b));
    assert_eq!(a.len() + b.len(), 15);

    let again = router
        .search(
            &SearchRequest::new("")
                .with_limit(10)
                .with_offset(10)
                .sorted_by("Path", false),
        )
        .unwrap();
    assert_eq!(hit_ids(&again), hit_ids(&second));
}

#[test]
fn test_zero_limit_uses_default_page() {
    let ws = Workspace::new();
    ws.seed_and_index(&fixture_numbered_files(15));

    let response = ws
        .router()
        .search(&SearchRequest::new("").with_limit(0))
        .unwrap();
    assert_eq!(response.hits.len(), 10);
}

#[test]
fn test_sort_by_mod_time_descending() {
    let ws = Workspace::new();
    ws.seed_and_index(&fixture_numbered_files(5));

    let response = ws
        .router()
        .search(&SearchRequest::new("").sorted_by("mod_time", true))
        .unwrap();
    let paths: Vec<_> = response.hits.iter().map(|h| h.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/d/file04.txt",
            "/d/file03.txt",
            "/d/file02.txt",
            "/d/file01.txt",
            "/d/file00.txt"
        ]
    );
}

#[test]
fn test_typed_field_queries() {
    let ws = Workspace::new();
    let stored = ws.seed_and_index(&fixture_numbered_files(5));
    let router = ws.router();

    let by_size = router
        .search(&SearchRequest::new("300").with_field("Size"))
        .unwrap();
    assert_hit_set(&by_size, &[&stored[2].id.to_string()]);

    let by_time = router
        .search(&SearchRequest::new(base_time().to_rfc3339()).with_field("ModTime"))
        .unwrap();
    assert_hit_set(&by_time, &[&stored[0].id.to_string()]);
}

#[test]
fn test_phrase_and_exclusion() {
    let ws = Workspace::new();
    let stored = ws.seed_and_index(&[
        fixture_file("/d/a.txt", 1).with_summary("quarterly finance notes"),
        fixture_file("/d/b.txt", 1).with_summary("finance quarterly review"),
    ]);
    let router = ws.router();

    let phrase = router
        .search(&SearchRequest::new("\"quarterly finance\""))
        .unwrap();
    assert_hit_set(&phrase, &[&stored[0].id.to_string()]);

    let excluded = router
        .search(&SearchRequest::new("finance -summary:review"))
        .unwrap();
    assert_hit_set(&excluded, &[&stored[0].id.to_string()]);
}

#[test]
fn test_unbalanced_quote_is_syntax_error() {
    let ws = Workspace::new();
    let err = ws
        .router()
        .search(&SearchRequest::new("\"quarterly finance"))
        .unwrap_err();

    match err {
        IndexError::QuerySyntax { token, .. } => assert_eq!(token, "\"quarterly finance"),
        other => panic!("expected QuerySyntax, got {:?}", other),
    }
}

#[test]
fn test_unknown_field_reference_is_syntax_error() {
    let ws = Workspace::new();
    let err = ws
        .router()
        .search(&SearchRequest::new("owner:alice"))
        .unwrap_err();
    assert!(matches!(err, IndexError::QuerySyntax { .. }));
    assert!(err.is_user_input());
}

#[test]
fn test_unknown_sort_field() {
    let ws = Workspace::new();
    ws.seed_and_index(&fixture_numbered_files(2));

    let err = ws
        .router()
        .search(&SearchRequest::new("").sorted_by("Popularity", true))
        .unwrap_err();
    assert!(matches!(err, IndexError::InvalidSortField(field) if field == "Popularity"));
}

//! Test fixture generators

use archive_index::{IndexOptions, LexicalIndex, QueryRouter};
use archive_manifest::{FileRecord, ManifestStore, SqliteManifest};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

/// Fixed scan time so runs are reproducible
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
}

/// A file record with `relative_path` derived from `path`
pub fn fixture_file(path: &str, size: u64) -> FileRecord {
    FileRecord::new(path, path.trim_start_matches('/'), size, base_time(), false)
}

pub fn fixture_dir(path: &str) -> FileRecord {
    FileRecord::new(path, path.trim_start_matches('/'), 0, base_time(), true)
}

/// `/d/file00.txt` .. `/d/file{n-1}.txt`, sizes 100, 200, ...
pub fn fixture_numbered_files(n: usize) -> Vec<FileRecord> {
    (0..n)
        .map(|i| {
            let mut record = fixture_file(&format!("/d/file{:02}.txt", i), (i as u64 + 1) * 100);
            record.mod_time = base_time() + Duration::hours(i as i64);
            record
        })
        .collect()
}

/// Temp dir holding `archive.db` and `index/`
pub struct Workspace {
    pub temp: TempDir,
    pub manifest: SqliteManifest,
    pub index: Arc<LexicalIndex>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::with_options(IndexOptions::default())
    }

    pub fn with_options(options: IndexOptions) -> Self {
        let temp = TempDir::new().unwrap();
        let manifest = SqliteManifest::open(temp.path().join("archive.db")).unwrap();
        let index = Arc::new(LexicalIndex::open(temp.path().join("index"), options).unwrap());
        Self {
            temp,
            manifest,
            index,
        }
    }

    pub fn router(&self) -> QueryRouter {
        QueryRouter::new(self.index.clone())
    }

    /// Upsert into the manifest only; returns stored records with ids
    pub fn seed(&self, records: &[FileRecord]) -> Vec<FileRecord> {
        records
            .iter()
            .map(|record| {
                let id = self.manifest.upsert(record).unwrap();
                self.manifest.get_by_id(id).unwrap().unwrap()
            })
            .collect()
    }

    /// Upsert into the manifest and index each stored record
    pub fn seed_and_index(&self, records: &[FileRecord]) -> Vec<FileRecord> {
        let stored = self.seed(records);
        for record in &stored {
            self.index.index_one(record).unwrap();
        }
        stored
    }
}

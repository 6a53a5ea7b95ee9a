//! SQLite adapter for ManifestStore
//!
//! One `files` table keyed by `path`, with a stable `INTEGER PRIMARY KEY
//! AUTOINCREMENT` id. The connection lives behind a single mutex, which
//! serializes writers and makes same-id updates last-committed-wins.
//!
//! `for_each_record` on a file-backed manifest reads through its own
//! read-only connection. WAL gives it a snapshot taken at the first row, and
//! writers keep going while the visitor runs. In-memory manifests have no
//! second connection and hold the writer lock for the whole scan.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{FileRecord, ManifestStats, ManifestStore};
use crate::{Result, StorageError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "SELECT id, path, relative_path, size, mod_time, is_dir, content_type, \
     sha256, processed, uploaded_url, upload_time, summary FROM files";

/// SQLite-based ManifestStore implementation
#[derive(Clone)]
pub struct SqliteManifest {
    conn: Arc<Mutex<Connection>>,
    /// `None` for in-memory manifests
    db_path: Option<PathBuf>,
}

impl SqliteManifest {
    /// Open (or create) the manifest at `db_path`, creating parent directories.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: Some(db_path.to_path_buf()),
        };
        store.init_schema()?;
        tracing::debug!("Opened manifest at {}", db_path.display());
        Ok(store)
    }

    /// Create an in-memory manifest (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL,
                relative_path TEXT NOT NULL,
                size INTEGER NOT NULL,
                mod_time DATETIME NOT NULL,
                is_dir BOOLEAN NOT NULL,
                content_type TEXT,
                sha256 TEXT,
                processed BOOLEAN NOT NULL DEFAULT 0,
                uploaded_url TEXT,
                upload_time DATETIME,
                summary TEXT,
                UNIQUE(path)
            );
            CREATE INDEX IF NOT EXISTS idx_files_path ON files(path);
            CREATE INDEX IF NOT EXISTS idx_files_relative_path ON files(relative_path);
            CREATE INDEX IF NOT EXISTS idx_files_processed ON files(processed);",
        )?;
        Ok(())
    }

    fn query_records(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<FileRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let records = stmt
            .query_map(args, row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn open_reader(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}

/// Stream every row in id order until `visit` breaks. Returns rows visited.
fn scan_records(
    conn: &Connection,
    visit: &mut dyn FnMut(FileRecord) -> ControlFlow<()>,
) -> Result<u64> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_COLUMNS))?;
    let rows = stmt.query_map([], row_to_record)?;

    let mut visited = 0u64;
    for row in rows {
        visited += 1;
        if visit(row?).is_break() {
            break;
        }
    }
    Ok(visited)
}

/// Map a `SELECT_COLUMNS` row. Text columns may be NULL in manifests written
/// by older scanners, so they read as empty strings.
fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        relative_path: row.get(2)?,
        size: row.get(3)?,
        mod_time: row.get::<_, DateTime<Utc>>(4)?,
        is_dir: row.get(5)?,
        content_type: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        sha256: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        processed: row.get::<_, Option<bool>>(8)?.unwrap_or(false),
        uploaded_url: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        upload_time: row.get(10)?,
        summary: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
    })
}

impl ManifestStore for SqliteManifest {
    fn upsert(&self, record: &FileRecord) -> Result<i64> {
        let conn = self.conn.lock();
        let id = conn.query_row(
            "INSERT INTO files
             (path, relative_path, size, mod_time, is_dir, content_type, sha256,
              processed, uploaded_url, upload_time, summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(path) DO UPDATE SET
                relative_path = excluded.relative_path,
                size = excluded.size,
                mod_time = excluded.mod_time,
                is_dir = excluded.is_dir,
                content_type = excluded.content_type,
                sha256 = excluded.sha256
             RETURNING id",
            params![
                &record.path,
                &record.relative_path,
                record.size,
                record.mod_time,
                record.is_dir,
                &record.content_type,
                &record.sha256,
                record.processed,
                &record.uploaded_url,
                record.upload_time,
                &record.summary,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_by_path(&self, path: &str) -> Result<Option<FileRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!("{} WHERE path = ?1", SELECT_COLUMNS),
                params![path],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn list_unprocessed(&self) -> Result<Vec<FileRecord>> {
        self.query_records(
            &format!(
                "{} WHERE processed = 0 AND is_dir = 0 ORDER BY path",
                SELECT_COLUMNS
            ),
            &[],
        )
    }

    fn list_by_content_type_prefix(&self, prefix: &str) -> Result<Vec<FileRecord>> {
        // substr() instead of LIKE: a literal prefix, no wildcard escaping
        self.query_records(
            &format!(
                "{} WHERE is_dir = 0 AND substr(IFNULL(content_type, ''), 1, length(?1)) = ?1
                 ORDER BY path",
                SELECT_COLUMNS
            ),
            &[&prefix],
        )
    }

    fn list_under_directory(&self, dir_path: &str) -> Result<Vec<FileRecord>> {
        let mut prefix = dir_path.to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.query_records(
            &format!(
                "{} WHERE substr(path, 1, length(?1)) = ?1 AND path <> ?1 ORDER BY path",
                SELECT_COLUMNS
            ),
            &[&prefix],
        )
    }

    fn update_status(
        &self,
        id: i64,
        processed: bool,
        uploaded_url: &str,
        summary: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE files
             SET processed = ?1, uploaded_url = ?2, upload_time = ?3, summary = ?4
             WHERE id = ?5",
            params![processed, uploaded_url, Utc::now(), summary, id],
        )?;
        if changed == 0 {
            return Err(StorageError::record_not_found(id));
        }
        Ok(())
    }

    fn stats(&self) -> Result<ManifestStats> {
        let conn = self.conn.lock();
        let stats = conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN is_dir = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN is_dir = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN is_dir = 0 AND processed = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN is_dir = 0 THEN size ELSE 0 END), 0)
             FROM files",
            [],
            |row| {
                Ok(ManifestStats {
                    total_files: row.get(0)?,
                    total_dirs: row.get(1)?,
                    processed_files: row.get(2)?,
                    total_size_bytes: row.get(3)?,
                })
            },
        )?;
        Ok(stats)
    }

    fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(count)
    }

    fn for_each_record(
        &self,
        visit: &mut dyn FnMut(FileRecord) -> ControlFlow<()>,
    ) -> Result<u64> {
        match &self.db_path {
            Some(db_path) => scan_records(&Self::open_reader(db_path)?, visit),
            None => scan_records(&self.conn.lock(), visit),
        }
    }
}

//! Manifest record → index document projection
//!
//! ```text
//! FileRecord ──from_record──▶ IndexDocument ──to_tantivy──▶ TantivyDocument
//!                                  ▲                              │
//!                                  └──────────from_tantivy────────┘
//! ```
//!
//! The projection is deterministic apart from `indexed_at`, so replaying the
//! manifest reproduces the index.

use archive_manifest::FileRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tantivy::schema::Value;
use tantivy::{Document, TantivyDocument};

use crate::features::lexical::schema::{IndexField, SchemaFields};

/// One searchable file document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// String form of the manifest id
    pub id: String,
    pub path: String,
    pub relative_path: String,
    /// Basename of `path`
    pub name: String,
    /// Lower-cased, with the dot; empty for directories and extensionless names
    pub extension: String,
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    pub is_dir: bool,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub uploaded_url: String,
    pub indexed_at: DateTime<Utc>,
    /// Stored fields this schema version does not know about
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl IndexDocument {
    /// Derive the document for `record`.
    ///
    /// `summary` is carried only when it is non-empty and `index_summaries`
    /// is enabled.
    pub fn from_record(record: &FileRecord, index_summaries: bool, indexed_at: DateTime<Utc>) -> Self {
        let summary = (index_summaries && !record.summary.is_empty()).then(|| record.summary.clone());

        Self {
            id: record.id.to_string(),
            path: record.path.clone(),
            relative_path: record.relative_path.clone(),
            name: file_name(&record.path),
            extension: if record.is_dir {
                String::new()
            } else {
                extension(&record.path)
            },
            size: record.size,
            mod_time: record.mod_time,
            is_dir: record.is_dir,
            content_type: record.content_type.clone(),
            summary,
            uploaded_url: record.uploaded_url.clone(),
            indexed_at,
            extra: BTreeMap::new(),
        }
    }

    pub fn to_tantivy(&self, fields: &SchemaFields) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        doc.add_text(fields.field(IndexField::Id), &self.id);
        doc.add_text(fields.field(IndexField::Path), &self.path);
        doc.add_text(fields.field(IndexField::RelativePath), &self.relative_path);
        doc.add_text(fields.field(IndexField::Name), &self.name);
        doc.add_text(fields.field(IndexField::Extension), &self.extension);
        doc.add_u64(fields.field(IndexField::Size), self.size);
        doc.add_date(fields.field(IndexField::ModTime), to_tantivy_date(self.mod_time));
        doc.add_bool(fields.field(IndexField::IsDir), self.is_dir);
        doc.add_text(fields.field(IndexField::ContentType), &self.content_type);
        if let Some(summary) = &self.summary {
            doc.add_text(fields.field(IndexField::Summary), summary);
        }
        doc.add_text(fields.field(IndexField::UploadedUrl), &self.uploaded_url);
        doc.add_date(fields.field(IndexField::IndexedAt), to_tantivy_date(self.indexed_at));
        doc
    }

    /// Read a stored document back. Missing fields fall back to empty values.
    pub fn from_tantivy(doc: &TantivyDocument, fields: &SchemaFields) -> Self {
        let text = |field: IndexField| {
            doc.get_first(fields.field(field))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string()
        };
        let date = |field: IndexField| {
            doc.get_first(fields.field(field))
                .and_then(|v| v.as_datetime())
                .map(from_tantivy_date)
                .unwrap_or_default()
        };

        let summary = text(IndexField::Summary);

        let mut extra = BTreeMap::new();
        for (field, value) in doc.iter_fields_and_values() {
            if fields.is_known(field) {
                continue;
            }
            if let Ok(json) = serde_json::to_value(value) {
                extra.insert(fields.name_of(field).to_string(), json);
            }
        }

        Self {
            id: text(IndexField::Id),
            path: text(IndexField::Path),
            relative_path: text(IndexField::RelativePath),
            name: text(IndexField::Name),
            extension: text(IndexField::Extension),
            size: doc
                .get_first(fields.field(IndexField::Size))
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            mod_time: date(IndexField::ModTime),
            is_dir: doc
                .get_first(fields.field(IndexField::IsDir))
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            content_type: text(IndexField::ContentType),
            summary: (!summary.is_empty()).then_some(summary),
            uploaded_url: text(IndexField::UploadedUrl),
            indexed_at: date(IndexField::IndexedAt),
            extra,
        }
    }

    /// Numeric form of `id`, used as the deterministic tie-breaker.
    pub fn numeric_id(&self) -> i64 {
        self.id.parse().unwrap_or(i64::MAX)
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

fn extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

pub(crate) fn to_tantivy_date(time: DateTime<Utc>) -> tantivy::DateTime {
    tantivy::DateTime::from_timestamp_micros(time.timestamp_micros())
}

pub(crate) fn from_tantivy_date(time: tantivy::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(time.into_timestamp_micros()).unwrap_or_default()
}

//! Tantivy Schema Definition
//!
//! # 12-Field Schema
//!
//! | Field | Kind | Notes |
//! |-------|------|-------|
//! | `ID` | keyword | join key with the manifest, delete term, fast (tie-break) |
//! | `Path`, `RelativePath`, `Name`, `Summary` | analyzed text | default search scope |
//! | `Extension`, `ContentType`, `UploadedURL` | keyword | exact, case-sensitive |
//! | `Size` | u64 | fast |
//! | `ModTime`, `IndexedAt` | date | fast |
//! | `IsDir` | bool | fast |
//!
//! Every field is STORED so results carry the full document.

use std::fmt;
use std::str::FromStr;
use tantivy::schema::{Field, FieldType, Schema, FAST, INDEXED, STORED, STRING, TEXT};

// Field name constants (for type-safe access)
pub const FIELD_ID: &str = "ID";
pub const FIELD_PATH: &str = "Path";
pub const FIELD_RELATIVE_PATH: &str = "RelativePath";
pub const FIELD_NAME: &str = "Name";
pub const FIELD_EXTENSION: &str = "Extension";
pub const FIELD_SIZE: &str = "Size";
pub const FIELD_MOD_TIME: &str = "ModTime";
pub const FIELD_IS_DIR: &str = "IsDir";
pub const FIELD_CONTENT_TYPE: &str = "ContentType";
pub const FIELD_SUMMARY: &str = "Summary";
pub const FIELD_UPLOADED_URL: &str = "UploadedURL";
pub const FIELD_INDEXED_AT: &str = "IndexedAt";

/// How a field is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Tokenized by the default analyzer
    Text,
    /// Raw tokenizer, matched whole
    Keyword,
    U64,
    Date,
    Bool,
}

/// Every field of an indexed file document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexField {
    Id,
    Path,
    RelativePath,
    Name,
    Extension,
    Size,
    ModTime,
    IsDir,
    ContentType,
    Summary,
    UploadedUrl,
    IndexedAt,
}

impl IndexField {
    pub const ALL: [IndexField; 12] = [
        IndexField::Id,
        IndexField::Path,
        IndexField::RelativePath,
        IndexField::Name,
        IndexField::Extension,
        IndexField::Size,
        IndexField::ModTime,
        IndexField::IsDir,
        IndexField::ContentType,
        IndexField::Summary,
        IndexField::UploadedUrl,
        IndexField::IndexedAt,
    ];

    /// Default scope of free-text queries.
    pub const ANALYZED: [IndexField; 4] = [
        IndexField::Path,
        IndexField::RelativePath,
        IndexField::Name,
        IndexField::Summary,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IndexField::Id => FIELD_ID,
            IndexField::Path => FIELD_PATH,
            IndexField::RelativePath => FIELD_RELATIVE_PATH,
            IndexField::Name => FIELD_NAME,
            IndexField::Extension => FIELD_EXTENSION,
            IndexField::Size => FIELD_SIZE,
            IndexField::ModTime => FIELD_MOD_TIME,
            IndexField::IsDir => FIELD_IS_DIR,
            IndexField::ContentType => FIELD_CONTENT_TYPE,
            IndexField::Summary => FIELD_SUMMARY,
            IndexField::UploadedUrl => FIELD_UPLOADED_URL,
            IndexField::IndexedAt => FIELD_INDEXED_AT,
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            IndexField::Path | IndexField::RelativePath | IndexField::Name | IndexField::Summary => {
                FieldKind::Text
            }
            IndexField::Id
            | IndexField::Extension
            | IndexField::ContentType
            | IndexField::UploadedUrl => FieldKind::Keyword,
            IndexField::Size => FieldKind::U64,
            IndexField::ModTime | IndexField::IndexedAt => FieldKind::Date,
            IndexField::IsDir => FieldKind::Bool,
        }
    }

    /// Resolve a user-supplied field name.
    ///
    /// Case-insensitive, ignores `_` and `-`, so `Summary`, `summary`,
    /// `mod_time` and `ModTime` all resolve.
    pub fn from_name(name: &str) -> Option<IndexField> {
        let wanted = normalize(name);
        if wanted.is_empty() {
            return None;
        }
        IndexField::ALL
            .into_iter()
            .find(|f| normalize(f.name()) == wanted)
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for IndexField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for IndexField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndexField::from_name(s).ok_or_else(|| format!("unknown field '{}'", s))
    }
}

/// Build the Tantivy schema
pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    for field in IndexField::ALL {
        let name = field.name();
        match field.kind() {
            // Positions kept for phrase queries and snippets
            FieldKind::Text => {
                schema_builder.add_text_field(name, TEXT | STORED);
            }
            FieldKind::Keyword if field == IndexField::Id => {
                schema_builder.add_text_field(name, STRING | STORED | FAST);
            }
            FieldKind::Keyword => {
                schema_builder.add_text_field(name, STRING | STORED);
            }
            FieldKind::U64 => {
                schema_builder.add_u64_field(name, INDEXED | STORED | FAST);
            }
            FieldKind::Date => {
                schema_builder.add_date_field(name, INDEXED | STORED | FAST);
            }
            FieldKind::Bool => {
                schema_builder.add_bool_field(name, INDEXED | STORED | FAST);
            }
        }
    }

    schema_builder.build()
}

/// Field handles resolved against a concrete (possibly on-disk) schema
#[derive(Debug, Clone)]
pub struct SchemaFields {
    pub schema: Schema,
    handles: [Field; 12],
}

impl SchemaFields {
    /// Resolve and type-check every required field.
    ///
    /// Fields the schema has beyond these are allowed; they surface through
    /// `IndexDocument::extra`.
    pub fn from_schema(schema: &Schema) -> Result<Self, String> {
        let mut handles = Vec::with_capacity(IndexField::ALL.len());
        for field in IndexField::ALL {
            let handle = schema
                .get_field(field.name())
                .map_err(|_| format!("schema is missing field '{}'", field.name()))?;
            let compatible = matches!(
                (field.kind(), schema.get_field_entry(handle).field_type()),
                (FieldKind::Text | FieldKind::Keyword, FieldType::Str(_))
                    | (FieldKind::U64, FieldType::U64(_))
                    | (FieldKind::Date, FieldType::Date(_))
                    | (FieldKind::Bool, FieldType::Bool(_))
            );
            if !compatible {
                return Err(format!("field '{}' has an incompatible type", field.name()));
            }
            handles.push(handle);
        }

        let handles: [Field; 12] = handles
            .try_into()
            .map_err(|_| "field count mismatch".to_string())?;
        Ok(Self {
            schema: schema.clone(),
            handles,
        })
    }

    pub fn field(&self, field: IndexField) -> Field {
        self.handles[field as usize]
    }

    /// Name of a field handle, including fields unknown to `IndexField`.
    pub fn name_of(&self, field: Field) -> &str {
        self.schema.get_field_name(field)
    }

    pub fn analyzed(&self) -> Vec<Field> {
        IndexField::ANALYZED
            .iter()
            .map(|f| self.field(*f))
            .collect()
    }

    pub fn is_known(&self, field: Field) -> bool {
        self.handles.contains(&field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_has_12_fields() {
        let schema = build_schema();
        assert_eq!(schema.fields().count(), 12);
    }

    #[test]
    fn test_all_fields_stored() {
        let schema = build_schema();
        for (_, entry) in schema.fields() {
            assert!(entry.is_stored(), "{} should be stored", entry.name());
        }
    }

    #[test]
    fn test_sort_keys_are_fast() {
        let schema = build_schema();
        for field in [IndexField::Id, IndexField::Size, IndexField::ModTime, IndexField::IsDir] {
            let handle = schema.get_field(field.name()).unwrap();
            assert!(schema.get_field_entry(handle).is_fast(), "{} should be fast", field);
        }
        let path = schema.get_field(FIELD_PATH).unwrap();
        assert!(!schema.get_field_entry(path).is_fast());
    }

    #[test]
    fn test_field_handles_follow_enum_order() {
        let fields = SchemaFields::from_schema(&build_schema()).unwrap();
        for field in IndexField::ALL {
            assert_eq!(fields.name_of(fields.field(field)), field.name());
        }
    }

    #[test]
    fn test_from_schema_rejects_missing_field() {
        let mut builder = Schema::builder();
        builder.add_text_field(FIELD_PATH, TEXT | STORED);
        let err = SchemaFields::from_schema(&builder.build()).unwrap_err();
        assert!(err.contains("missing field"));
    }

    #[test]
    fn test_from_schema_rejects_wrong_type() {
        let mut builder = Schema::builder();
        // `Size` must be u64, not text
        for field in IndexField::ALL {
            builder.add_text_field(field.name(), STRING | STORED);
        }
        let err = SchemaFields::from_schema(&builder.build()).unwrap_err();
        assert!(err.contains("incompatible"));
    }

    #[test]
    fn test_field_name_resolution() {
        assert_eq!(IndexField::from_name("Summary"), Some(IndexField::Summary));
        assert_eq!(IndexField::from_name("summary"), Some(IndexField::Summary));
        assert_eq!(IndexField::from_name("mod_time"), Some(IndexField::ModTime));
        assert_eq!(IndexField::from_name("uploaded_url"), Some(IndexField::UploadedUrl));
        assert_eq!(IndexField::from_name("Owner"), None);
        assert_eq!(IndexField::from_name(""), None);
        assert!("bogus".parse::<IndexField>().is_err());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(IndexField::Summary.kind(), FieldKind::Text);
        assert_eq!(IndexField::Extension.kind(), FieldKind::Keyword);
        assert_eq!(IndexField::Size.kind(), FieldKind::U64);
        assert_eq!(IndexField::IndexedAt.kind(), FieldKind::Date);
        assert_eq!(IndexField::IsDir.kind(), FieldKind::Bool);
    }
}

//! Query construction
//!
//! Three shapes:
//! - empty text → match-all (scores reported as 0)
//! - text + field → the field's own analyzer (or a typed parse for
//!   numeric/date/bool fields), terms ORed against that field only
//! - free text → Tantivy `QueryParser` over the analyzed fields
//!
//! Free text is checked before parsing: unbalanced quotes and unknown
//! `field:` references fail with `QuerySyntax` naming the offending token.
//! Known references are rewritten to their schema names, so `summary:x`
//! and `Summary:x` are the same query.

use chrono::{DateTime, Utc};
use tantivy::query::{AllQuery, BooleanQuery, EmptyQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, Term};

use crate::errors::{IndexError, Result};
use crate::features::lexical::document::to_tantivy_date;
use crate::features::lexical::schema::{FieldKind, IndexField, SchemaFields};

/// A query ready to run.
#[derive(Debug)]
pub struct BuiltQuery {
    pub query: Box<dyn Query>,
    /// Every document matches; scores carry no information
    pub match_all: bool,
}

pub fn build_query(
    index: &Index,
    fields: &SchemaFields,
    text: &str,
    field: Option<&str>,
) -> Result<BuiltQuery> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(BuiltQuery {
            query: Box::new(AllQuery),
            match_all: true,
        });
    }

    let query = match field.map(str::trim).filter(|f| !f.is_empty()) {
        Some(name) => {
            let field = IndexField::from_name(name).ok_or_else(|| {
                IndexError::query_syntax(name, format!("unknown field '{}'", name))
            })?;
            field_query(index, fields, field, text)?
        }
        None => free_text_query(index, fields, text)?,
    };

    Ok(BuiltQuery {
        query,
        match_all: false,
    })
}

fn field_query(
    index: &Index,
    fields: &SchemaFields,
    field: IndexField,
    text: &str,
) -> Result<Box<dyn Query>> {
    let handle = fields.field(field);

    let term = match field.kind() {
        FieldKind::Text | FieldKind::Keyword => {
            let mut analyzer = index.tokenizer_for_field(handle)?;
            let mut stream = analyzer.token_stream(text);
            let mut terms = Vec::new();
            while stream.advance() {
                terms.push(Term::from_field_text(handle, &stream.token().text));
            }

            let option = if field.kind() == FieldKind::Text {
                IndexRecordOption::WithFreqs
            } else {
                IndexRecordOption::Basic
            };
            let query: Box<dyn Query> = match terms.len() {
                // Nothing survived analysis, e.g. punctuation only
                0 => Box::new(EmptyQuery),
                1 => Box::new(TermQuery::new(terms.remove(0), option)),
                _ => Box::new(BooleanQuery::new(
                    terms
                        .into_iter()
                        .map(|term| {
                            (
                                Occur::Should,
                                Box::new(TermQuery::new(term, option)) as Box<dyn Query>,
                            )
                        })
                        .collect(),
                )),
            };
            return Ok(query);
        }
        FieldKind::U64 => {
            let value: u64 = text.parse().map_err(|_| {
                IndexError::query_syntax(text, format!("{} expects an unsigned integer", field))
            })?;
            Term::from_field_u64(handle, value)
        }
        FieldKind::Date => {
            let value = DateTime::parse_from_rfc3339(text).map_err(|_| {
                IndexError::query_syntax(text, format!("{} expects an RFC 3339 timestamp", field))
            })?;
            Term::from_field_date(handle, to_tantivy_date(value.with_timezone(&Utc)))
        }
        FieldKind::Bool => {
            let value = match text.to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => {
                    return Err(IndexError::query_syntax(
                        text,
                        format!("{} expects true or false", field),
                    ))
                }
            };
            Term::from_field_bool(handle, value)
        }
    };

    Ok(Box::new(TermQuery::new(term, IndexRecordOption::Basic)))
}

fn free_text_query(index: &Index, fields: &SchemaFields, text: &str) -> Result<Box<dyn Query>> {
    let normalized = normalize_free_text(text)?;
    let parser = QueryParser::for_index(index, fields.analyzed());
    parser
        .parse_query(&normalized)
        .map_err(|e| IndexError::query_syntax(text, e.to_string()))
}

/// Validate quoting and rewrite `field:` references to schema names.
pub fn normalize_free_text(text: &str) -> Result<String> {
    if text.matches('"').count() % 2 == 1 {
        let unmatched = text.rfind('"').unwrap_or(0);
        return Err(IndexError::query_syntax(
            text[unmatched..].trim_end(),
            "unbalanced quote",
        ));
    }

    let mut out = String::with_capacity(text.len());
    // Even segments are outside quotes
    for (i, segment) in text.split('"').enumerate() {
        if i > 0 {
            out.push('"');
        }
        if i % 2 == 1 {
            out.push_str(segment);
        } else {
            rewrite_segment(segment, &mut out)?;
        }
    }
    Ok(out)
}

fn rewrite_segment(segment: &str, out: &mut String) -> Result<()> {
    let mut rest = segment;
    while !rest.is_empty() {
        let word_start = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
        out.push_str(&rest[..word_start]);
        rest = &rest[word_start..];

        let word_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rewrite_word(&rest[..word_end], out)?;
        rest = &rest[word_end..];
    }
    Ok(())
}

fn rewrite_word(word: &str, out: &mut String) -> Result<()> {
    let body_start = word
        .find(|c: char| !matches!(c, '+' | '-' | '('))
        .unwrap_or(word.len());
    let (prefix, body) = word.split_at(body_start);

    match body.find(':') {
        Some(colon) if colon > 0 => {
            let name = &body[..colon];
            let field = IndexField::from_name(name).ok_or_else(|| {
                IndexError::query_syntax(word, format!("unknown field '{}'", name))
            })?;
            out.push_str(prefix);
            out.push_str(field.name());
            out.push_str(&body[colon..]);
        }
        _ => out.push_str(word),
    }
    Ok(())
}

//! Template - `%{field}` expressions evaluated against a record
//!
//! Supported placeholders:
//! - `%{name}` top-level field
//! - `%{[outer][inner]}` nested field
//! - `%{+FORMAT}` record `@timestamp` rendered with a strftime pattern
//!
//! A placeholder whose value is missing (or null) is kept literally.

use chrono::format::{Item, StrftimeItems};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::Record;

/// Template syntax error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid template '{template}' at byte {position}: {message}")]
pub struct TemplateError {
    pub template: String,
    pub position: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { raw: String, path: Vec<String> },
    Timestamp { raw: String, format: String },
}

/// Parsed template, cheap to evaluate many times
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template
    ///
    /// # Errors
    /// Unterminated or empty placeholder, malformed field path, invalid time format.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("%{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let body_start = start + 2;
            let Some(len) = rest[body_start..].find('}') else {
                return Err(error(source, offset + start, "unterminated placeholder"));
            };
            let body = &rest[body_start..body_start + len];
            let raw = &rest[start..body_start + len + 1];
            segments.push(parse_placeholder(source, offset + start, raw, body)?);

            let consumed = body_start + len + 1;
            offset += consumed;
            rest = &rest[consumed..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Original expression
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True when the template yields the same string for every record
    pub fn is_constant(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Literal(_)))
    }

    /// Evaluate against one record
    pub fn render(&self, record: &Record) -> String {
        if self.is_constant() {
            return self.source.clone();
        }

        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { raw, path } => match record.get_path(path) {
                    Some(value) if !value.is_null() => render_value(value, &mut out),
                    _ => out.push_str(raw),
                },
                Segment::Timestamp { raw, format } => match record.timestamp_utc() {
                    Some(ts) => out.push_str(&ts.format(format).to_string()),
                    None => out.push_str(raw),
                },
            }
        }
        out
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_placeholder(
    source: &str,
    position: usize,
    raw: &str,
    body: &str,
) -> Result<Segment, TemplateError> {
    if body.is_empty() {
        return Err(error(source, position, "empty placeholder"));
    }

    if let Some(format) = body.strip_prefix('+') {
        if format.is_empty()
            || StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
        {
            return Err(error(source, position, "invalid time format"));
        }
        return Ok(Segment::Timestamp {
            raw: raw.to_string(),
            format: format.to_string(),
        });
    }

    let path = if body.starts_with('[') {
        parse_field_path(body).ok_or_else(|| error(source, position, "malformed field path"))?
    } else {
        vec![body.to_string()]
    };

    Ok(Segment::Field {
        raw: raw.to_string(),
        path,
    })
}

/// `[a][b][c]` -> ["a", "b", "c"]
fn parse_field_path(body: &str) -> Option<Vec<String>> {
    let mut path = Vec::new();
    let mut rest = body;
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let end = inner.find(']')?;
        let name = &inner[..end];
        if name.is_empty() || name.contains('[') {
            return None;
        }
        path.push(name.to_string());
        rest = &inner[end + 1..];
    }
    Some(path)
}

fn render_value(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                render_value(item, out);
            }
        }
        Value::Object(_) => out.push_str(&value.to_string()),
        Value::Null => {}
        other => out.push_str(&other.to_string()),
    }
}

fn error(source: &str, position: usize, message: &str) -> TemplateError {
    TemplateError {
        template: source.to_string(),
        position,
        message: message.to_string(),
    }
}

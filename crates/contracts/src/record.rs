//! Record / Document - inbound log record and its indexable form

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::IndexerError;

/// Reserved ingestion timestamp field
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// Reserved schema-version field
pub const VERSION_FIELD: &str = "@version";

/// Value stamped into [`VERSION_FIELD`] for records created here
pub const RECORD_VERSION: &str = "1";

/// Field name that carries the document id on the remote side
pub const DOCUMENT_ID_FIELD: &str = "id";

/// Ordered JSON field map
pub type FieldMap = Map<String, Value>;

/// Inbound log record
///
/// A field map that always carries the reserved `@timestamp` / `@version`
/// fields when created through [`Record::new`]. Read-only to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: FieldMap,
}

impl Record {
    /// Create a record, stamping missing reserved fields with "now" / version 1
    pub fn new(mut fields: FieldMap) -> Self {
        fields
            .entry(TIMESTAMP_FIELD)
            .or_insert_with(|| Value::String(now_rfc3339()));
        fields
            .entry(VERSION_FIELD)
            .or_insert_with(|| Value::String(RECORD_VERSION.to_string()));
        Self { fields }
    }

    /// Wrap a field map as-is (reserved fields may be absent)
    pub fn from_fields(fields: FieldMap) -> Self {
        Self { fields }
    }

    /// Parse one line of newline-delimited JSON into a record
    ///
    /// # Errors
    /// The line is not a JSON object.
    pub fn from_json_line(line: &str) -> Result<Self, IndexerError> {
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(fields)) => Ok(Self::new(fields)),
            Ok(other) => Err(IndexerError::InvalidRecord {
                message: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
            Err(e) => Err(IndexerError::InvalidRecord {
                message: e.to_string(),
            }),
        }
    }

    /// All fields, reserved ones included
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Top-level field lookup
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Nested field lookup (`["outer", "inner"]`)
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.fields.get(first.as_ref())?;
        for segment in rest {
            current = current.as_object()?.get(segment.as_ref())?;
        }
        Some(current)
    }

    /// Raw value of the reserved timestamp
    pub fn timestamp(&self) -> Option<&Value> {
        self.fields.get(TIMESTAMP_FIELD)
    }

    /// Reserved timestamp parsed as RFC 3339
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp()?.as_str()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// Indexable document derived from exactly one record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: FieldMap,
}

impl Document {
    pub fn from_fields(fields: FieldMap) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }

    /// Document id, if one was assigned
    pub fn id(&self) -> Option<&Value> {
        self.fields.get(DOCUMENT_ID_FIELD)
    }

    pub fn into_fields(self) -> FieldMap {
        self.fields
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

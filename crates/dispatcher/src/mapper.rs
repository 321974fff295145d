//! DocumentMapper - record -> indexable document

use serde_json::Value;

use contracts::{
    Document, IndexerError, Record, Template, DOCUMENT_ID_FIELD, TIMESTAMP_FIELD, VERSION_FIELD,
};

/// Strips reserved fields and injects `id` / timestamp copy
#[derive(Debug, Clone, Default)]
pub struct DocumentMapper {
    document_id: Option<Template>,
    timestamp_destination: Option<String>,
}

impl DocumentMapper {
    pub fn new(
        document_id: Option<&str>,
        timestamp_destination: Option<&str>,
    ) -> Result<Self, IndexerError> {
        let document_id = document_id
            .map(Template::parse)
            .transpose()
            .map_err(|e| IndexerError::configuration("document_id", e.to_string()))?;

        if timestamp_destination.is_some_and(str::is_empty) {
            return Err(IndexerError::configuration(
                "timestamp_destination",
                "must not be empty",
            ));
        }

        Ok(Self {
            document_id,
            timestamp_destination: timestamp_destination.map(str::to_string),
        })
    }

    /// Build the document for one record; the record is left untouched
    pub fn map(&self, record: &Record) -> Document {
        let mut fields = record.fields().clone();
        let timestamp = fields.remove(TIMESTAMP_FIELD);
        fields.remove(VERSION_FIELD);

        let mut document = Document::from_fields(fields);

        if let Some(template) = &self.document_id {
            document.insert(DOCUMENT_ID_FIELD, Value::String(template.render(record)));
        }
        if let (Some(field), Some(timestamp)) = (&self.timestamp_destination, timestamp) {
            document.insert(field.as_str(), timestamp);
        }

        document
    }
}

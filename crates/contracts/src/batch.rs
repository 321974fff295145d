//! Batch / SubmissionResult - Dispatcher <-> Submission Client exchange
//!
//! Position is the correlation key: entry `i` of a [`Batch`] is answered by
//! outcome `i` of its [`SubmissionResult`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Destination, Document, IndexerError};

/// One document inside a batch, tagged with the index of the record it came from
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Index of the originating record in the received slice
    pub position: usize,
    pub document: Document,
}

/// Ordered documents for one destination
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    destination: Destination,
    entries: Vec<BatchEntry>,
}

impl Batch {
    pub fn new(destination: Destination, entries: Vec<BatchEntry>) -> Self {
        Self {
            destination,
            entries,
        }
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Documents in submission order
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.entries.iter().map(|entry| &entry.document)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: BatchEntry) {
        self.entries.push(entry);
    }

    /// Split into consecutive batches of at most `size` entries, order preserved
    pub fn into_chunks(self, size: usize) -> Vec<Batch> {
        let size = size.max(1);
        let destination = self.destination;
        let mut chunks = Vec::with_capacity(self.entries.len().div_ceil(size));
        let mut entries = self.entries.into_iter().peekable();

        while entries.peek().is_some() {
            let chunk: Vec<BatchEntry> = entries.by_ref().take(size).collect();
            chunks.push(Batch::new(destination.clone(), chunk));
        }
        chunks
    }
}

/// Per-document result reported by the remote API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// Id assigned or echoed by the remote side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// Empty on success
    #[serde(default)]
    pub errors: Vec<String>,
}

impl SubmissionOutcome {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failure(errors: Vec<String>) -> Self {
        Self { id: None, errors }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Canonical, ordered answer to one submitted batch
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    /// HTTP status of the response
    pub status: u16,
    pub outcomes: Vec<SubmissionOutcome>,
}

/// A document the remote API refused; it is not retried
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedDocument {
    pub destination: Destination,
    pub position: usize,
    pub document: Document,
    pub errors: Vec<String>,
}

/// A whole batch that could not be delivered
#[derive(Debug)]
pub struct BatchFailure {
    pub destination: Destination,
    /// Record positions of the documents in the lost batch
    pub positions: Vec<usize>,
    pub error: IndexerError,
}

/// Outcome of one `receive` call
#[derive(Debug, Default)]
pub struct DispatchSummary {
    /// Records received
    pub received: usize,
    /// Batches submitted (successful or not)
    pub batches: usize,
    /// Documents accepted by the remote API
    pub indexed: usize,
    /// Transport-level retries performed across all batches
    pub retries: u32,
    /// Documents refused individually
    pub dropped: Vec<DroppedDocument>,
    /// Batches lost as a whole
    pub failed_batches: Vec<BatchFailure>,
}

impl DispatchSummary {
    /// Documents lost with their batch
    pub fn failed_documents(&self) -> usize {
        self.failed_batches.iter().map(|f| f.positions.len()).sum()
    }

    /// True when every received record was indexed
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty() && self.failed_batches.is_empty()
    }

    /// Fold another summary into this one
    pub fn merge(&mut self, other: DispatchSummary) {
        self.received += other.received;
        self.batches += other.batches;
        self.indexed += other.indexed;
        self.retries += other.retries;
        self.dropped.extend(other.dropped);
        self.failed_batches.extend(other.failed_batches);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(position: usize) -> BatchEntry {
        let mut document = Document::default();
        document.insert("n", json!(position));
        BatchEntry { position, document }
    }

    #[test]
    fn test_into_chunks_preserves_order() {
        let batch = Batch::new("engine".into(), (0..250).map(entry).collect());
        let chunks = batch.into_chunks(100);

        assert_eq!(
            chunks.iter().map(Batch::len).collect::<Vec<_>>(),
            vec![100, 100, 50]
        );
        let positions: Vec<usize> = chunks
            .iter()
            .flat_map(|c| c.entries().iter().map(|e| e.position))
            .collect();
        assert_eq!(positions, (0..250).collect::<Vec<_>>());
        assert!(chunks.iter().all(|c| c.destination() == "engine"));
    }

    #[test]
    fn test_into_chunks_empty_batch() {
        let batch = Batch::new("engine".into(), Vec::new());
        assert!(batch.into_chunks(10).is_empty());
    }

    #[test]
    fn test_outcome_deserializes_without_errors_field() {
        let outcome: SubmissionOutcome = serde_json::from_value(json!({"id": "abc"})).unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.id, Some(json!("abc")));

        let outcome: SubmissionOutcome =
            serde_json::from_value(json!({"id": null, "errors": ["bad field"]})).unwrap();
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_summary_merge() {
        let mut total = DispatchSummary {
            received: 2,
            batches: 1,
            indexed: 2,
            ..Default::default()
        };
        total.merge(DispatchSummary {
            received: 3,
            batches: 1,
            indexed: 1,
            retries: 2,
            dropped: vec![DroppedDocument {
                destination: "e".into(),
                position: 0,
                document: Document::default(),
                errors: vec!["failed".into()],
            }],
            failed_batches: vec![BatchFailure {
                destination: "e".into(),
                positions: vec![1],
                error: IndexerError::transport("/x", "down"),
            }],
        });

        assert_eq!(total.received, 5);
        assert_eq!(total.indexed, 3);
        assert_eq!(total.retries, 2);
        assert_eq!(total.failed_documents(), 1);
        assert!(!total.is_clean());
    }
}

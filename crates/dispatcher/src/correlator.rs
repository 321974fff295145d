//! Response Correlator - positional outcome -> document matching

use serde_json::Value;
use tracing::warn;

use contracts::{Batch, DroppedDocument, IndexerError, SubmissionResult};

/// Per-batch correlation outcome
#[derive(Debug, Default)]
pub struct Correlation {
    pub indexed: usize,
    pub dropped: Vec<DroppedDocument>,
}

/// Match outcome `i` to document `i`
///
/// Each refused document is logged once and dropped. A count mismatch is
/// reported before anything is logged.
pub fn correlate(batch: &Batch, result: &SubmissionResult) -> Result<Correlation, IndexerError> {
    if result.outcomes.len() != batch.len() {
        return Err(IndexerError::contract_violation(
            batch.destination().as_str(),
            format!(
                "{} outcome(s) for {} document(s)",
                result.outcomes.len(),
                batch.len()
            ),
        ));
    }

    let mut correlation = Correlation::default();
    for (entry, outcome) in batch.entries().iter().zip(&result.outcomes) {
        if outcome.is_success() {
            correlation.indexed += 1;
            continue;
        }

        let document = Value::Object(entry.document.fields().clone());
        let errors = Value::from(outcome.errors.clone());
        warn!(
            document = %document,
            errors = %errors,
            "Document failed to index. Dropping.."
        );
        correlation.dropped.push(DroppedDocument {
            destination: batch.destination().clone(),
            position: entry.position,
            document: entry.document.clone(),
            errors: outcome.errors.clone(),
        });
    }

    Ok(correlation)
}

//! SubmissionClient - one batch, one request, one canonical result
//!
//! Both remote response layouts are normalized into the same ordered
//! outcome list. Which layout to expect is fixed by the [`ApiFlavor`].

use serde_json::Value;
use tracing::{debug, instrument};

use contracts::{
    ApiFlavor, Batch, Destination, DocumentTransport, IndexerError, ResponseShape,
    SubmissionOutcome, SubmissionResult, TransportResponse,
};

/// Sends batches over a transport
#[derive(Debug, Clone)]
pub struct SubmissionClient<T: DocumentTransport> {
    transport: T,
    flavor: ApiFlavor,
}

impl<T: DocumentTransport> SubmissionClient<T> {
    pub fn new(transport: T, flavor: ApiFlavor) -> Self {
        Self { transport, flavor }
    }

    pub fn flavor(&self) -> ApiFlavor {
        self.flavor
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Submit one batch and return one outcome per document, in order
    ///
    /// # Errors
    /// - `Transport` / `CertificatePath`: retryable
    /// - `RequestRejected`: 4xx without per-document detail
    /// - `ContractViolation`: unexpected shape on 2xx or outcome count mismatch
    #[instrument(
        name = "submission_client_submit",
        skip(self, batch),
        fields(destination = %batch.destination(), documents = batch.len())
    )]
    pub async fn submit(&self, batch: &Batch) -> Result<SubmissionResult, IndexerError> {
        let path = self.flavor.documents_path(batch.destination());
        let body = Value::Array(
            batch
                .documents()
                .map(|document| Value::Object(document.fields().clone()))
                .collect(),
        );

        let response = self.transport.post_json(&path, &body).await?;
        let target = path.join("/");
        debug!(status = response.status, target = %target, "Bulk response received");

        let result = normalize(self.flavor.response_shape(), &target, &response)?;
        if result.outcomes.len() != batch.len() {
            return Err(IndexerError::contract_violation(
                target,
                format!(
                    "submitted {} document(s) but received {} outcome(s)",
                    batch.len(),
                    result.outcomes.len()
                ),
            ));
        }
        Ok(result)
    }

    /// Probe the API once before traffic
    ///
    /// # Errors
    /// Any transport failure or non-2xx status, as a configuration error.
    #[instrument(name = "submission_client_check", skip(self))]
    pub async fn check_connection(
        &self,
        destination: Option<&Destination>,
    ) -> Result<(), IndexerError> {
        let path = self.flavor.check_path(destination);
        let target = format!("{}{}", self.transport.endpoint(), path.join("/"));

        let response = self.transport.get(&path).await.map_err(|e| {
            IndexerError::configuration("url", format!("connection check failed: {e}"))
        })?;
        if !response.is_success() {
            return Err(IndexerError::configuration(
                "url",
                format!(
                    "connection check against '{target}' returned status {}: {}",
                    response.status,
                    response.body_text()
                ),
            ));
        }

        debug!(target = %target, "Connection check passed");
        Ok(())
    }
}

/// Turn a raw response into a [`SubmissionResult`]
///
/// Count is not checked here.
pub fn normalize(
    shape: ResponseShape,
    target: &str,
    response: &TransportResponse,
) -> Result<SubmissionResult, IndexerError> {
    let body: Value = serde_json::from_slice(&response.body).map_err(|e| {
        IndexerError::transport(
            target,
            format!(
                "unparseable response (status {}): {e}: {}",
                response.status,
                truncate(&response.body_text())
            ),
        )
    })?;

    let items = match shape {
        ResponseShape::BareList => body.as_array(),
        ResponseShape::WrappedResults => body.get("results").and_then(Value::as_array),
    };

    match items.and_then(|items| parse_outcomes(items)) {
        Some(outcomes) => Ok(SubmissionResult {
            status: response.status,
            outcomes,
        }),
        None => Err(wrong_shape(shape, target, response)),
    }
}

fn parse_outcomes(items: &[Value]) -> Option<Vec<SubmissionOutcome>> {
    items
        .iter()
        .map(|item| {
            item.is_object()
                .then(|| serde_json::from_value(item.clone()).ok())
                .flatten()
        })
        .collect()
}

fn wrong_shape(shape: ResponseShape, target: &str, response: &TransportResponse) -> IndexerError {
    let body = truncate(&response.body_text());
    if response.is_server_error() {
        IndexerError::transport(
            target,
            format!("server error {} with unexpected body: {body}", response.status),
        )
    } else if response.is_client_error() {
        IndexerError::RequestRejected {
            target: target.to_string(),
            status: response.status,
            body,
        }
    } else {
        IndexerError::contract_violation(
            target,
            format!(
                "expected {} response, got status {}: {body}",
                match shape {
                    ResponseShape::BareList => "a list",
                    ResponseShape::WrappedResults => "a 'results' list",
                },
                response.status
            ),
        )
    }
}

fn truncate(text: &str) -> String {
    const MAX: usize = 512;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

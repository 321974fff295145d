//! Mock transport
//!
//! Records every request and answers through an injectable responder.
//! Used by unit tests and by `--dry-run`.

use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};

use contracts::{ApiFlavor, DocumentTransport, IndexerError, ResponseShape, TransportResponse};

/// Request as seen by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: Vec<String>,
    pub body: Option<Value>,
}

impl RecordedRequest {
    /// Documents of a POST body
    pub fn documents(&self) -> &[Value] {
        self.body
            .as_ref()
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

type Responder =
    dyn Fn(&RecordedRequest) -> Result<TransportResponse, IndexerError> + Send + Sync;

/// In-memory transport; clones share the request log
#[derive(Clone)]
pub struct MockTransport {
    endpoint: String,
    responder: Arc<Responder>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockTransport {
    /// Answer each request with the given closure
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> Result<TransportResponse, IndexerError> + Send + Sync + 'static,
    {
        Self {
            endpoint: "mock://".to_string(),
            responder: Arc::new(responder),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Accept every document, answering in the shape `flavor` expects
    pub fn accepting(flavor: ApiFlavor) -> Self {
        Self::with_responder(move |request| {
            let outcomes = request
                .documents()
                .iter()
                .map(|doc| {
                    let id = doc.get("id").cloned().unwrap_or(Value::Null);
                    json!({"id": id, "errors": []})
                })
                .collect();
            Ok(TransportResponse::new(
                200,
                shaped_body(flavor, outcomes).to_string(),
            ))
        })
    }

    /// All requests received so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn handle(&self, request: RecordedRequest) -> Result<TransportResponse, IndexerError> {
        let result = (self.responder)(&request);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        result
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("requests", &self.request_count())
            .finish()
    }
}

impl DocumentTransport for MockTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_json(
        &self,
        path: &[String],
        body: &Value,
    ) -> Result<TransportResponse, IndexerError> {
        self.handle(RecordedRequest {
            method: "POST",
            path: path.to_vec(),
            body: Some(body.clone()),
        })
    }

    async fn get(&self, path: &[String]) -> Result<TransportResponse, IndexerError> {
        self.handle(RecordedRequest {
            method: "GET",
            path: path.to_vec(),
            body: None,
        })
    }
}

/// Wrap per-document outcomes the way `flavor` responds
pub fn shaped_body(flavor: ApiFlavor, outcomes: Vec<Value>) -> Value {
    match flavor.response_shape() {
        ResponseShape::BareList => Value::Array(outcomes),
        ResponseShape::WrappedResults => json!({ "results": outcomes }),
    }
}

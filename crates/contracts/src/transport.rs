//! DocumentTransport trait - Submission Client wire interface
//!
//! The client is generic over this trait, so a client without a transport
//! cannot be composed.

use bytes::Bytes;
use serde_json::Value;

use crate::IndexerError;

/// Raw HTTP answer, body not yet interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }

    /// Body as lossy UTF-8, for error messages
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Wire interface used by the Submission Client
///
/// Implementations must be safe to share across concurrent submissions.
#[trait_variant::make(DocumentTransport: Send)]
pub trait LocalDocumentTransport {
    /// Base endpoint (used for logging)
    fn endpoint(&self) -> &str;

    /// POST a JSON body to the given path segments
    ///
    /// # Errors
    /// Transport-level failure only (connection, TLS, timeout). Any HTTP
    /// status is returned as a response.
    async fn post_json(&self, path: &[String], body: &Value)
        -> Result<TransportResponse, IndexerError>;

    /// GET the given path segments
    async fn get(&self, path: &[String]) -> Result<TransportResponse, IndexerError>;
}

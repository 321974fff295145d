//! Layered error definitions
//!
//! Categorized by where the failure stops: configuration / transport / remote API contract.

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum IndexerError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid or incomplete configuration, raised before any traffic
    #[error("configuration error at '{field}': {message}")]
    Configuration { field: String, message: String },

    // ===== Transport Errors (retryable) =====
    /// Connection, timeout or unparseable response
    #[error("transport error for '{target}': {message}")]
    Transport { target: String, message: String },

    /// TLS peer certificate could not be validated
    #[error("certificate path validation failed for '{target}': {message}")]
    CertificatePath { target: String, message: String },

    // ===== Batch-level fatal errors =====
    /// Structured 4xx response without per-document detail
    #[error("request to '{target}' rejected with status {status}: {body}")]
    RequestRejected {
        target: String,
        status: u16,
        body: String,
    },

    /// Response shape or outcome count does not match the submitted batch
    #[error("contract violation for '{target}': {message}")]
    ContractViolation { target: String, message: String },

    /// Transport failures persisted past the retry bound
    #[error("batch for '{destination}' failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        destination: String,
        attempts: u32,
        #[source]
        source: Box<IndexerError>,
    },

    // ===== General Errors =====
    /// Inbound record could not be decoded
    #[error("invalid record: {message}")]
    InvalidRecord { message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexerError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration error for a field path
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create certificate path error
    pub fn certificate_path(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CertificatePath {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create contract violation error
    pub fn contract_violation(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ContractViolation {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Whether a fresh attempt of the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::CertificatePath { .. })
    }

    /// Whether the failure (or the cause it wraps) is a certificate validation failure
    pub fn is_certificate_error(&self) -> bool {
        match self {
            Self::CertificatePath { .. } => true,
            Self::RetriesExhausted { source, .. } => source.is_certificate_error(),
            _ => false,
        }
    }

    /// Whether the error aborts the output before it sends anything
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::ConfigParse { .. })
    }

    /// Short stable label, used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigParse { .. } | Self::Configuration { .. } => "configuration",
            Self::Transport { .. } => "transport",
            Self::CertificatePath { .. } => "certificate",
            Self::RequestRejected { .. } => "rejected",
            Self::ContractViolation { .. } => "contract_violation",
            Self::RetriesExhausted { source, .. } if source.is_certificate_error() => {
                "retries_exhausted_certificate"
            }
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::InvalidRecord { .. } => "invalid_record",
            Self::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_retryable() {
        assert!(IndexerError::transport("/x", "connection refused").is_retryable());
        assert!(IndexerError::certificate_path("/x", "unknown issuer").is_retryable());
        assert!(!IndexerError::contract_violation("/x", "count").is_retryable());
        assert!(!IndexerError::configuration("url", "missing").is_retryable());
    }

    #[test]
    fn certificate_error_visible_through_exhaustion() {
        let err = IndexerError::RetriesExhausted {
            destination: "engine".into(),
            attempts: 3,
            source: Box::new(IndexerError::certificate_path("/x", "unknown issuer")),
        };
        assert!(err.is_certificate_error());
        assert!(err.to_string().contains("certificate path"));

        let err = IndexerError::RetriesExhausted {
            destination: "engine".into(),
            attempts: 3,
            source: Box::new(IndexerError::transport("/x", "connection refused")),
        };
        assert!(!err.is_certificate_error());
    }
}

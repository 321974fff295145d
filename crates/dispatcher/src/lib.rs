//! # Dispatcher
//!
//! Batch-indexing pipeline for App Search / Workplace Search.
//!
//! Responsibilities:
//! - Resolve a destination per record and map records to documents
//! - Group by destination, chunk to `batch_size`, submit in order
//! - Retry transport failures only, drop refused documents with a warning
//! - Build the TLS transport from flat `ssl` options

pub mod batcher;
pub mod client;
pub mod correlator;
pub mod dispatcher;
pub mod mapper;
pub mod metrics;
pub mod resolver;
pub mod retry;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use client::{normalize, SubmissionClient};
pub use contracts::{DispatchSummary, DocumentTransport, Record};
pub use correlator::{correlate, Correlation};
pub use dispatcher::{DispatcherBuilder, IndexingDispatcher};
pub use mapper::DocumentMapper;
pub use metrics::{DispatcherMetrics, MetricsSnapshot};
pub use resolver::DestinationResolver;
pub use retry::{with_retry, Retried, RetryPolicy};
pub use transport::{HttpTransport, MockTransport, TransportConfig};

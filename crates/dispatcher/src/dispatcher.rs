//! IndexingDispatcher - records in, batches out, outcomes back
//!
//! resolve -> map -> group by destination -> chunk -> submit (with retry) -> correlate

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

use contracts::{
    Batch, BatchEntry, BatchFailure, DispatchSummary, DocumentTransport, IndexerError,
    OutputConfig, Record,
};

use crate::batcher;
use crate::client::SubmissionClient;
use crate::correlator::correlate;
use crate::mapper::DocumentMapper;
use crate::metrics::{DispatcherMetrics, MetricsSnapshot};
use crate::resolver::DestinationResolver;
use crate::retry::{with_retry, RetryPolicy};
use crate::transport::{self, HttpTransport};

/// Builder for creating an IndexingDispatcher
pub struct DispatcherBuilder {
    config: OutputConfig,
}

impl DispatcherBuilder {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Build over HTTP(S), TLS options included
    ///
    /// # Errors
    /// Any configuration problem; no request is sent.
    #[instrument(
        name = "dispatcher_builder_build",
        skip(self),
        fields(url = %self.config.url, flavor = %self.config.target.flavor())
    )]
    pub fn build(self) -> Result<IndexingDispatcher<HttpTransport>, IndexerError> {
        let tls = transport::build(&self.config.ssl)?;
        let transport = HttpTransport::new(
            &self.config.url,
            self.config.target.credential(),
            Duration::from_secs(self.config.timeout_secs),
            &tls,
        )?;
        self.build_with_transport(transport)
    }

    /// Build over a caller-supplied transport
    pub fn build_with_transport<T: DocumentTransport>(
        self,
        transport: T,
    ) -> Result<IndexingDispatcher<T>, IndexerError> {
        let target = &self.config.target;
        let resolver = DestinationResolver::new(target.destination_field(), target.destination())?;
        let mapper = DocumentMapper::new(
            self.config.document_id.as_deref(),
            self.config.timestamp_destination.as_deref(),
        )?;
        if self.config.batch_size == 0 {
            return Err(IndexerError::configuration("batch_size", "must be at least 1"));
        }

        debug!(
            destination = resolver.expression(),
            constant = resolver.constant().is_some(),
            batch_size = self.config.batch_size,
            "Dispatcher configured"
        );

        Ok(IndexingDispatcher {
            resolver,
            mapper,
            client: SubmissionClient::new(transport, target.flavor()),
            retry: RetryPolicy::from(&self.config.retry),
            batch_size: self.config.batch_size,
            metrics: Arc::new(DispatcherMetrics::new()),
        })
    }
}

/// Indexes records into App Search engines or Workplace Search sources
pub struct IndexingDispatcher<T: DocumentTransport> {
    resolver: DestinationResolver,
    mapper: DocumentMapper,
    client: SubmissionClient<T>,
    retry: RetryPolicy,
    batch_size: usize,
    metrics: Arc<DispatcherMetrics>,
}

impl<T: DocumentTransport> IndexingDispatcher<T> {
    pub fn client(&self) -> &SubmissionClient<T> {
        &self.client
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Probe the remote API; a constant destination is probed directly
    pub async fn check_connection(&self) -> Result<(), IndexerError> {
        self.client.check_connection(self.resolver.constant()).await
    }

    /// Index one ordered slice of records
    ///
    /// Batches go out one at a time, destinations in order of first
    /// appearance. A failed batch is logged and dropped; the remaining
    /// batches are still sent.
    #[instrument(
        name = "dispatcher_receive",
        skip(self, records),
        fields(records = records.len())
    )]
    pub async fn receive(&self, records: &[Record]) -> DispatchSummary {
        let mut summary = DispatchSummary {
            received: records.len(),
            ..Default::default()
        };

        let entries = records.iter().enumerate().map(|(position, record)| {
            (
                self.resolver.resolve(record),
                BatchEntry {
                    position,
                    document: self.mapper.map(record),
                },
            )
        });

        for group in batcher::group(entries) {
            for batch in group.into_chunks(self.batch_size) {
                self.dispatch_batch(batch, &mut summary).await;
            }
        }

        self.metrics.record(&summary);
        debug!(
            batches = summary.batches,
            indexed = summary.indexed,
            dropped = summary.dropped.len(),
            failed_batches = summary.failed_batches.len(),
            "Receive complete"
        );
        summary
    }

    #[instrument(
        name = "dispatcher_batch",
        skip(self, batch, summary),
        fields(destination = %batch.destination(), documents = batch.len())
    )]
    async fn dispatch_batch(&self, batch: Batch, summary: &mut DispatchSummary) {
        summary.batches += 1;

        let client = &self.client;
        let submitted = &batch;
        let retried = with_retry(&self.retry, batch.destination(), move || {
            client.submit(submitted)
        })
        .await;
        summary.retries += retried.retries;

        match retried.result.and_then(|result| correlate(&batch, &result)) {
            Ok(correlation) => {
                summary.indexed += correlation.indexed;
                summary.dropped.extend(correlation.dropped);
            }
            Err(e) => {
                error!(
                    destination = %batch.destination(),
                    documents = batch.len(),
                    certificate_error = e.is_certificate_error(),
                    error = %e,
                    "Batch failed, dropping"
                );
                summary.failed_batches.push(BatchFailure {
                    destination: batch.destination().clone(),
                    positions: batch.entries().iter().map(|entry| entry.position).collect(),
                    error: e,
                });
            }
        }

        if retried.retries > 0 {
            info!(retries = retried.retries, "Batch needed retries");
        }
    }
}

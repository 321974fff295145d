//! Dispatcher counters for observability

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::DispatchSummary;

/// Cumulative counters of one dispatcher
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Records handed to `receive`
    received: AtomicU64,
    /// Batches submitted
    batches: AtomicU64,
    /// Documents accepted
    indexed: AtomicU64,
    /// Documents refused individually
    dropped: AtomicU64,
    /// Batches lost as a whole
    failed_batches: AtomicU64,
    /// Documents lost with their batch
    failed_documents: AtomicU64,
    /// Transport retries
    retries: AtomicU64,
}

impl DispatcherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the counts of one `receive` call
    pub fn record(&self, summary: &DispatchSummary) {
        self.received
            .fetch_add(summary.received as u64, Ordering::Relaxed);
        self.batches
            .fetch_add(summary.batches as u64, Ordering::Relaxed);
        self.indexed
            .fetch_add(summary.indexed as u64, Ordering::Relaxed);
        self.dropped
            .fetch_add(summary.dropped.len() as u64, Ordering::Relaxed);
        self.failed_batches
            .fetch_add(summary.failed_batches.len() as u64, Ordering::Relaxed);
        self.failed_documents
            .fetch_add(summary.failed_documents() as u64, Ordering::Relaxed);
        self.retries
            .fetch_add(u64::from(summary.retries), Ordering::Relaxed);
    }

    pub fn indexed(&self) -> u64 {
        self.indexed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            indexed: self.indexed(),
            dropped: self.dropped(),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            failed_documents: self.failed_documents.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher counters (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub batches: u64,
    pub indexed: u64,
    pub dropped: u64,
    pub failed_batches: u64,
    pub failed_documents: u64,
    pub retries: u64,
}

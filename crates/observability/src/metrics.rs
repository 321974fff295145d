//! Dispatch metrics
//!
//! Prometheus counters/histograms fed from `DispatchSummary`, plus an
//! in-memory aggregator for the end-of-run report.

use std::collections::HashMap;

use contracts::DispatchSummary;
use metrics::{counter, histogram};

/// Record the counters of one `receive` call
///
/// # Example
///
/// ```ignore
/// let summary = dispatcher.receive(&records).await;
/// observability::metrics::record_dispatch_summary(&summary);
/// ```
pub fn record_dispatch_summary(summary: &DispatchSummary) {
    counter!("search_shipper_records_received_total").increment(summary.received as u64);
    counter!("search_shipper_documents_indexed_total").increment(summary.indexed as u64);
    counter!("search_shipper_batches_total").increment(summary.batches as u64);

    if summary.retries > 0 {
        counter!("search_shipper_submission_retries_total").increment(u64::from(summary.retries));
    }

    for dropped in &summary.dropped {
        counter!(
            "search_shipper_documents_dropped_total",
            "destination" => dropped.destination.to_string()
        )
        .increment(1);
    }

    for failure in &summary.failed_batches {
        counter!(
            "search_shipper_batches_failed_total",
            "destination" => failure.destination.to_string(),
            "kind" => failure.error.kind()
        )
        .increment(1);
        counter!(
            "search_shipper_documents_failed_total",
            "destination" => failure.destination.to_string()
        )
        .increment(failure.positions.len() as u64);
    }
}

/// Wall time of one `receive` call
pub fn record_dispatch_latency_ms(latency_ms: f64) {
    histogram!("search_shipper_dispatch_latency_ms").record(latency_ms);
}

/// Input lines that could not be decoded into records
pub fn record_invalid_records(count: u64) {
    if count > 0 {
        counter!("search_shipper_records_invalid_total").increment(count);
    }
}

/// Dispatch metrics aggregator
///
/// Aggregates in memory for the run summary.
#[derive(Debug, Clone, Default)]
pub struct DispatchMetricsAggregator {
    pub total_received: u64,
    pub total_indexed: u64,
    pub total_dropped: u64,
    pub total_failed_documents: u64,
    pub failed_batches: u64,
    pub total_batches: u64,
    pub total_retries: u64,
    pub invalid_records: u64,

    /// `receive` wall time (ms)
    pub latency_stats: RunningStats,

    /// Refused documents per destination
    pub dropped_by_destination: HashMap<String, u64>,

    /// Lost batches per error kind
    pub failures_by_kind: HashMap<String, u64>,
}

impl DispatchMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, summary: &DispatchSummary, latency_ms: f64) {
        self.total_received += summary.received as u64;
        self.total_indexed += summary.indexed as u64;
        self.total_dropped += summary.dropped.len() as u64;
        self.total_failed_documents += summary.failed_documents() as u64;
        self.failed_batches += summary.failed_batches.len() as u64;
        self.total_batches += summary.batches as u64;
        self.total_retries += u64::from(summary.retries);
        self.latency_stats.push(latency_ms);

        for dropped in &summary.dropped {
            *self
                .dropped_by_destination
                .entry(dropped.destination.to_string())
                .or_insert(0) += 1;
        }
        for failure in &summary.failed_batches {
            *self
                .failures_by_kind
                .entry(failure.error.kind().to_string())
                .or_insert(0) += 1;
        }
    }

    pub fn record_invalid(&mut self, count: u64) {
        self.invalid_records += count;
    }

    /// Build the summary report
    pub fn summary(&self) -> MetricsSummary {
        let lost = self.total_dropped + self.total_failed_documents;
        MetricsSummary {
            total_received: self.total_received,
            total_indexed: self.total_indexed,
            total_dropped: self.total_dropped,
            total_failed_documents: self.total_failed_documents,
            failed_batches: self.failed_batches,
            total_batches: self.total_batches,
            total_retries: self.total_retries,
            invalid_records: self.invalid_records,
            loss_rate: percent(lost, self.total_received),
            dispatch_latency_ms: StatsSummary::from(&self.latency_stats),
            dropped_by_destination: self.dropped_by_destination.clone(),
            failures_by_kind: self.failures_by_kind.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_received: u64,
    pub total_indexed: u64,
    pub total_dropped: u64,
    pub total_failed_documents: u64,
    pub failed_batches: u64,
    pub total_batches: u64,
    pub total_retries: u64,
    pub invalid_records: u64,
    /// Dropped + failed, as a percentage of received
    pub loss_rate: f64,
    pub dispatch_latency_ms: StatsSummary,
    pub dropped_by_destination: HashMap<String, u64>,
    pub failures_by_kind: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Metrics Summary ===")?;
        writeln!(f, "Records received: {}", self.total_received)?;
        writeln!(f, "Documents indexed: {}", self.total_indexed)?;
        writeln!(
            f,
            "Documents dropped: {}, lost with failed batches: {} ({:.2}% lost)",
            self.total_dropped, self.total_failed_documents, self.loss_rate
        )?;
        writeln!(
            f,
            "Batches: {} ({} failed, {} retries)",
            self.total_batches, self.failed_batches, self.total_retries
        )?;
        if self.invalid_records > 0 {
            writeln!(f, "Invalid input lines: {}", self.invalid_records)?;
        }
        writeln!(f, "Dispatch latency (ms): {}", self.dispatch_latency_ms)?;

        if !self.dropped_by_destination.is_empty() {
            writeln!(f, "Dropped per destination:")?;
            for (destination, count) in &self.dropped_by_destination {
                writeln!(f, "  {destination}: {count}")?;
            }
        }
        if !self.failures_by_kind.is_empty() {
            writeln!(f, "Failed batches per cause:")?;
            for (kind, count) in &self.failures_by_kind {
                writeln!(f, "  {kind}: {count}")?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

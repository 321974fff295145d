//! Pipeline statistics and metrics.

use std::time::Duration;

use observability::DispatchMetricsAggregator;

/// Why a run ended before its input was exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Ctrl+C or SIGTERM
    Signal,
    /// `--timeout` elapsed
    Timeout,
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Input lines consumed, blank and invalid ones included
    pub lines_read: u64,

    /// Calls to the dispatcher
    pub receive_calls: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Documents were acknowledged locally
    pub dry_run: bool,

    /// Set when the run was cut short
    pub stopped: Option<StopReason>,

    /// Dispatch metrics aggregator
    pub metrics: DispatchMetricsAggregator,
}

impl PipelineStats {
    /// Indexed documents per second
    pub fn docs_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.metrics.total_indexed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Lines read: {}", self.lines_read);
        println!("   ├─ Dispatcher calls: {}", self.receive_calls);
        println!("   ├─ Docs/s: {:.2}", self.docs_per_sec());
        match self.stopped {
            Some(reason) => println!("   ├─ Stopped early: {:?}", reason),
            None => println!("   ├─ Input exhausted"),
        }
        println!("   └─ Dry run: {}", self.dry_run);

        println!("\n{}", self.metrics.summary());
    }
}

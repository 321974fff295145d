//! # Observability
//!
//! Logging and Prometheus metrics for the shipper.
//!
//! Logs go to stderr so stdout stays free for command output. The HTTP and
//! TLS stack is held at `warn` unless `RUST_LOG` says otherwise.
//!
//! ## Usage
//!
//! ```ignore
//! observability::init_logging(LoggingConfig::default())?;
//! observability::install_metrics_exporter(9000)?;
//!
//! let started = std::time::Instant::now();
//! let summary = dispatcher.receive(&records).await;
//! observability::record_dispatch_summary(&summary);
//! observability::record_dispatch_latency_ms(started.elapsed().as_secs_f64() * 1000.0);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

pub use crate::metrics::{
    record_dispatch_latency_ms, record_dispatch_summary, record_invalid_records,
    DispatchMetricsAggregator, MetricsSummary, RunningStats, StatsSummary,
};

/// Crates whose chatter is capped at `warn` by the default filter
const QUIET_DEPENDENCIES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_format: LogFormat,
    /// Level for the shipper's own events when `RUST_LOG` is unset
    pub default_log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            default_log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    Pretty,
    Compact,
}

/// Filter directives used when `RUST_LOG` is unset
pub fn default_directives(level: &str) -> String {
    let mut directives = level.to_string();
    for target in QUIET_DEPENDENCIES {
        directives.push_str(&format!(",{target}=warn"));
    }
    directives
}

/// Install the global tracing subscriber
///
/// # Errors
/// A subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.default_log_level)));

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(log_format = ?config.log_format, "Logging initialized");
    Ok(())
}

/// Serve Prometheus metrics on `0.0.0.0:<port>`
///
/// # Errors
/// The port cannot be bound or a recorder is already installed.
pub fn install_metrics_exporter(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}

//! Pipeline orchestrator - reads records and feeds the dispatcher.
//!
//! Records are read line by line and handed to the dispatcher in chunks.
//! With `dry_run` the dispatcher runs over a local transport that accepts
//! every document, so routing and mapping are exercised without traffic.

use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::{DocumentTransport, OutputConfig, Record};
use dispatcher::{DispatcherBuilder, IndexingDispatcher, MockTransport};
use observability::{record_dispatch_latency_ms, record_dispatch_summary, record_invalid_records};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use super::{PipelineStats, StopReason};
use crate::error::CliError;

/// Where records are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    /// `None` and `-` both mean stdin
    pub fn from_arg(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) if path.as_os_str() != "-" => Self::File(path),
            _ => Self::Stdin,
        }
    }

    fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Stdin => None,
            Self::File(path) => Some(path),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated output configuration
    pub output: OutputConfig,

    /// Record source
    pub input: InputSource,

    /// Records per `receive` call
    pub chunk_size: usize,

    /// Acknowledge locally instead of sending
    pub dry_run: bool,

    /// Probe the remote API before the first batch
    pub check_connection: bool,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the input is exhausted or `shutdown` resolves
    ///
    /// On shutdown the records already read are still dispatched.
    pub async fn run<S>(self, shutdown: S) -> Result<PipelineStats>
    where
        S: Future<Output = StopReason>,
    {
        if let Some(port) = self.config.metrics_port {
            observability::install_metrics_exporter(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let builder = DispatcherBuilder::new(self.config.output.clone());

        if self.config.dry_run {
            info!("Running in DRY-RUN mode (documents are acknowledged locally)");
            let flavor = self.config.output.target.flavor();
            let dispatcher = builder
                .build_with_transport(MockTransport::accepting(flavor))
                .map_err(CliError::from)?;
            return self.drive(dispatcher, shutdown).await;
        }

        let dispatcher = builder.build().map_err(CliError::from)?;

        if self.config.check_connection {
            info!(url = %self.config.output.url, "Checking connection...");
            dispatcher
                .check_connection()
                .await
                .map_err(CliError::from)
                .context("Connection check failed")?;
            info!("Connection check passed");
        }

        self.drive(dispatcher, shutdown).await
    }

    async fn drive<T, S>(
        &self,
        dispatcher: IndexingDispatcher<T>,
        shutdown: S,
    ) -> Result<PipelineStats>
    where
        T: DocumentTransport,
        S: Future<Output = StopReason>,
    {
        let start_time = Instant::now();
        let input = &self.config.input;
        let chunk_size = self.config.chunk_size.max(1);

        let reader = open(input).await?;
        let mut lines = reader.lines();

        let mut stats = PipelineStats {
            dry_run: self.config.dry_run,
            ..Default::default()
        };
        let mut chunk: Vec<Record> = Vec::with_capacity(chunk_size);

        info!(
            input = ?input,
            chunk_size,
            batch_size = dispatcher.batch_size(),
            "Pipeline running"
        );

        tokio::pin!(shutdown);

        loop {
            let line = tokio::select! {
                biased;
                reason = &mut shutdown => {
                    warn!(?reason, pending = chunk.len(), "Stopping, flushing pending records");
                    stats.stopped = Some(reason);
                    None
                }
                line = lines.next_line() => {
                    line.map_err(|e| CliError::input(input.path(), e))?
                }
            };
            let Some(line) = line else {
                break;
            };

            stats.lines_read += 1;
            if line.trim().is_empty() {
                continue;
            }

            match Record::from_json_line(&line) {
                Ok(record) => chunk.push(record),
                Err(e) => {
                    warn!(line = stats.lines_read, error = %e, "Skipping invalid input line");
                    stats.metrics.record_invalid(1);
                    record_invalid_records(1);
                }
            }

            if chunk.len() >= chunk_size {
                dispatch_chunk(&dispatcher, &mut chunk, &mut stats).await;
            }
        }

        if !chunk.is_empty() {
            dispatch_chunk(&dispatcher, &mut chunk, &mut stats).await;
        }

        stats.duration = start_time.elapsed();

        let totals = dispatcher.metrics();
        info!(
            received = totals.received,
            indexed = totals.indexed,
            dropped = totals.dropped,
            failed_batches = totals.failed_batches,
            retries = totals.retries,
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline finished"
        );

        Ok(stats)
    }
}

async fn open(input: &InputSource) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, CliError> {
    match input {
        InputSource::Stdin => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
        InputSource::File(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .map_err(|e| CliError::input(Some(path), e))?;
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

async fn dispatch_chunk<T: DocumentTransport>(
    dispatcher: &IndexingDispatcher<T>,
    chunk: &mut Vec<Record>,
    stats: &mut PipelineStats,
) {
    let started = Instant::now();
    let summary = dispatcher.receive(chunk).await;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    record_dispatch_summary(&summary);
    record_dispatch_latency_ms(latency_ms);
    stats.metrics.update(&summary, latency_ms);
    stats.receive_calls += 1;

    debug!(
        records = summary.received,
        batches = summary.batches,
        indexed = summary.indexed,
        dropped = summary.dropped.len(),
        failed_batches = summary.failed_batches.len(),
        latency_ms = format!("{:.2}", latency_ms),
        "Chunk dispatched"
    );

    chunk.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};
    use std::io::Write;

    const CONFIG: &str = r#"
url = "http://localhost:3002"
document_id = "%{uid}"
batch_size = 2

[target]
kind = "app_search"
api_key = "private-key"
engine = "%{service}"
"#;

    fn config(input: InputSource, chunk_size: usize) -> PipelineConfig {
        PipelineConfig {
            output: ConfigLoader::load_from_str(CONFIG, ConfigFormat::Toml).unwrap(),
            input,
            chunk_size,
            dry_run: true,
            check_connection: false,
            metrics_port: None,
        }
    }

    fn input_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    #[test]
    fn test_input_source_from_arg() {
        assert_eq!(InputSource::from_arg(None), InputSource::Stdin);
        assert_eq!(InputSource::from_arg(Some("-".into())), InputSource::Stdin);
        assert_eq!(
            InputSource::from_arg(Some("events.ndjson".into())),
            InputSource::File("events.ndjson".into())
        );
    }

    #[tokio::test]
    async fn test_dry_run_indexes_every_record() {
        let file = input_file(&[
            r#"{"uid": 1, "service": "web", "message": "a"}"#,
            r#"{"uid": 2, "service": "db", "message": "b"}"#,
            "",
            r#"{"uid": 3, "service": "web", "message": "c"}"#,
            r#"{"uid": 4, "service": "web", "message": "d"}"#,
            r#"{"uid": 5, "service": "db", "message": "e"}"#,
        ]);

        let pipeline = Pipeline::new(config(InputSource::File(file.path().into()), 3));
        let stats = pipeline.run(std::future::pending()).await.unwrap();

        assert_eq!(stats.lines_read, 6);
        assert_eq!(stats.receive_calls, 2);
        assert_eq!(stats.metrics.total_received, 5);
        assert_eq!(stats.metrics.total_indexed, 5);
        // chunk 1: web(1,3) db(2); chunk 2: web(4) db(5)
        assert_eq!(stats.metrics.total_batches, 4);
        assert!(stats.stopped.is_none());
    }

    #[tokio::test]
    async fn test_invalid_lines_are_skipped() {
        let file = input_file(&[
            r#"{"uid": 1, "service": "web"}"#,
            "not json",
            "[1, 2]",
            r#"{"uid": 2, "service": "web"}"#,
        ]);

        let pipeline = Pipeline::new(config(InputSource::File(file.path().into()), 100));
        let stats = pipeline.run(std::future::pending()).await.unwrap();

        assert_eq!(stats.metrics.invalid_records, 2);
        assert_eq!(stats.metrics.total_indexed, 2);
        assert_eq!(stats.receive_calls, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_reading() {
        let file = input_file(&[r#"{"uid": 1, "service": "web"}"#]);

        let pipeline = Pipeline::new(config(InputSource::File(file.path().into()), 100));
        let stats = pipeline
            .run(std::future::ready(StopReason::Signal))
            .await
            .unwrap();

        assert_eq!(stats.stopped, Some(StopReason::Signal));
    }

    #[tokio::test]
    async fn test_missing_input_file() {
        let pipeline = Pipeline::new(config(
            InputSource::File("/nonexistent/events.ndjson".into()),
            100,
        ));
        let err = pipeline.run(std::future::pending()).await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/events.ndjson"));
    }
}

//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use super::load_config;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{InputSource, Pipeline, PipelineConfig, StopReason};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let mut output = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref url) = args.url {
        info!(url = %url, "Overriding Enterprise Search URL from CLI");
        output.url = url.clone();
    }

    info!(
        url = %output.url,
        flavor = %output.target.flavor(),
        destination = output.target.destination(),
        batch_size = output.batch_size,
        "Configuration loaded"
    );

    let pipeline_config = PipelineConfig {
        output,
        input: InputSource::from_arg(args.input.clone()),
        chunk_size: args.chunk_size,
        dry_run: args.dry_run,
        check_connection: !args.skip_connection_check,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };
    let timeout = if args.timeout == 0 {
        None
    } else {
        Some(Duration::from_secs(args.timeout))
    };

    info!("Starting pipeline...");

    let stats = Pipeline::new(pipeline_config)
        .run(stop_signal(timeout))
        .await
        .context("Pipeline execution failed")?;

    info!(
        indexed = stats.metrics.total_indexed,
        dropped = stats.metrics.total_dropped,
        failed_batches = stats.metrics.failed_batches,
        duration_secs = stats.duration.as_secs_f64(),
        docs_per_sec = format!("{:.2}", stats.docs_per_sec()),
        "Pipeline completed"
    );

    stats.print_summary();

    if stats.metrics.failed_batches > 0 {
        return Err(CliError::Delivery {
            failed_batches: stats.metrics.failed_batches,
            failed_documents: stats.metrics.total_failed_documents,
        }
        .into());
    }
    if stats.stopped == Some(StopReason::Timeout) {
        return Err(CliError::Timeout { secs: args.timeout }.into());
    }

    info!("Search Shipper finished");
    Ok(())
}

/// Resolves on Ctrl+C, SIGTERM or when `timeout` elapses
async fn stop_signal(timeout: Option<Duration>) -> StopReason {
    let deadline = async {
        match timeout {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = shutdown_signal() => StopReason::Signal,
        _ = deadline => StopReason::Timeout,
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{OutputConfig, SslVerificationMode, Template};
use dispatcher::DispatcherBuilder;
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    connection: Option<String>,
}

#[derive(Serialize)]
struct ConfigSummary {
    flavor: String,
    url: String,
    destination: String,
    templated_destination: bool,
    batch_size: usize,
    max_attempts: u32,
}

/// Execute the `validate` command
///
/// Loads the file, then builds the dispatcher so TLS material and the URL
/// are checked too. Nothing is sent unless `--check-connection` is given.
pub async fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args).await;

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

async fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();
    let invalid = |error: String| ValidationResult {
        valid: false,
        config_path: config_path.clone(),
        error: Some(error),
        warnings: None,
        summary: None,
        connection: None,
    };

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => return invalid(e.to_string()),
    };

    let warnings = collect_warnings(&config);
    let summary = summarize(&config);

    let dispatcher = match DispatcherBuilder::new(config).build() {
        Ok(dispatcher) => dispatcher,
        Err(e) => return invalid(e.to_string()),
    };

    let connection = if args.check_connection {
        match dispatcher.check_connection().await {
            Ok(()) => Some("ok".to_string()),
            Err(e) => return invalid(e.to_string()),
        }
    } else {
        None
    };

    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: if warnings.is_empty() {
            None
        } else {
            Some(warnings)
        },
        summary: Some(summary),
        connection,
    }
}

fn summarize(config: &OutputConfig) -> ConfigSummary {
    let destination = config.target.destination();
    ConfigSummary {
        flavor: config.target.flavor().to_string(),
        url: config.url.clone(),
        destination: destination.to_string(),
        templated_destination: Template::parse(destination)
            .map(|t| !t.is_constant())
            .unwrap_or(false),
        batch_size: config.batch_size,
        max_attempts: config.retry.max_attempts,
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &OutputConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let ssl = &config.ssl;

    if config.url.starts_with("http://") {
        warnings.push("url uses plain http - credentials are sent unencrypted".to_string());
    }

    if ssl.verification_mode == SslVerificationMode::None {
        warnings.push(
            "ssl.verification_mode = none - server certificates are not verified".to_string(),
        );
    }

    if ssl.certificate_authorities.len() > 1 {
        warnings.push(format!(
            "ssl.certificate_authorities lists {} files - only the first one is used",
            ssl.certificate_authorities.len()
        ));
    }

    if config.document_id.is_none() {
        warnings.push(
            "document_id is not set - resent records are indexed again under new ids"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Flavor: {}", summary.flavor);
            println!("  URL: {}", summary.url);
            println!(
                "  Destination: {}{}",
                summary.destination,
                if summary.templated_destination {
                    " (per record)"
                } else {
                    ""
                }
            );
            println!("  Batch size: {}", summary.batch_size);
            println!("  Max attempts: {}", summary.max_attempts);
        }

        if let Some(ref connection) = result.connection {
            println!("  Connection: {}", connection);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

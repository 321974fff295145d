//! Config validation
//!
//! Rules:
//! - field ranges from the `Validate` derive (batch_size, retry, url, ...)
//! - url scheme is http or https
//! - credential and destination are not blank
//! - destination / document_id templates parse
//! - retry.initial_delay_ms <= retry.max_delay_ms
//!
//! TLS options are checked when the transport is built.

use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use contracts::{IndexerError, OutputConfig, Template};

/// Validate an OutputConfig
///
/// Returns the first error found, or Ok(()).
pub fn validate(config: &OutputConfig) -> Result<(), IndexerError> {
    validate_fields(config)?;
    validate_url(config)?;
    validate_target(config)?;
    validate_document_id(config)?;
    validate_retry(config)?;
    Ok(())
}

/// Derived range / format checks
fn validate_fields(config: &OutputConfig) -> Result<(), IndexerError> {
    config.validate().map_err(|errors| {
        let mut problems = Vec::new();
        flatten(&errors, "", &mut problems);
        problems.sort();
        match problems.into_iter().next() {
            Some((field, message)) => IndexerError::configuration(field, message),
            None => IndexerError::configuration("config", errors.to_string()),
        }
    })
}

fn flatten(errors: &ValidationErrors, prefix: &str, out: &mut Vec<(String, String)>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' check", error.code));
                    out.push((path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(nested) => flatten(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten(nested, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

fn validate_url(config: &OutputConfig) -> Result<(), IndexerError> {
    let url = config.url.to_ascii_lowercase();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(IndexerError::configuration(
            "url",
            format!("expected an http(s) url, got '{}'", config.url),
        ));
    }
    Ok(())
}

fn validate_target(config: &OutputConfig) -> Result<(), IndexerError> {
    let target = &config.target;

    if target.credential().expose().trim().is_empty() {
        return Err(IndexerError::configuration(
            target.credential_field(),
            "must not be empty",
        ));
    }

    let destination = target.destination();
    if destination.trim().is_empty() {
        return Err(IndexerError::configuration(
            target.destination_field(),
            "must not be empty",
        ));
    }
    Template::parse(destination)
        .map_err(|e| IndexerError::configuration(target.destination_field(), e.to_string()))?;

    Ok(())
}

fn validate_document_id(config: &OutputConfig) -> Result<(), IndexerError> {
    if let Some(expression) = &config.document_id {
        Template::parse(expression)
            .map_err(|e| IndexerError::configuration("document_id", e.to_string()))?;
    }
    Ok(())
}

fn validate_retry(config: &OutputConfig) -> Result<(), IndexerError> {
    let retry = &config.retry;
    if retry.initial_delay_ms > retry.max_delay_ms {
        return Err(IndexerError::configuration(
            "retry.initial_delay_ms / retry.max_delay_ms",
            format!(
                "initial_delay_ms ({}) must be <= max_delay_ms ({})",
                retry.initial_delay_ms, retry.max_delay_ms
            ),
        ));
    }
    Ok(())
}

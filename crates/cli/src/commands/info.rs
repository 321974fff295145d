//! `info` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{OutputConfig, SslVerificationMode, TargetConfig};
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    flavor: String,
    url: String,
    destination: DestinationInfo,
    documents: DocumentInfo,
    batching: BatchingInfo,
    tls: TlsInfo,
    /// Full configuration with defaults applied, secrets redacted
    effective: serde_json::Value,
}

#[derive(Serialize)]
struct DestinationInfo {
    kind: &'static str,
    expression: String,
}

#[derive(Serialize)]
struct DocumentInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    id_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp_destination: Option<String>,
}

#[derive(Serialize)]
struct BatchingInfo {
    batch_size: usize,
    timeout_secs: u64,
    max_attempts: u32,
    initial_delay_ms: u64,
    max_delay_ms: u64,
}

#[derive(Serialize)]
struct TlsInfo {
    verification: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    certificate_authority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    truststore: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    protocols: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&config)?;
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config)?;
    }

    Ok(())
}

fn verification(config: &OutputConfig) -> &'static str {
    match config.ssl.verification_mode {
        SslVerificationMode::Full => "full",
        SslVerificationMode::None => "none",
    }
}

fn build_config_info(config: &OutputConfig) -> Result<ConfigInfo> {
    let flavor = config.target.flavor();
    let effective: serde_json::Value = serde_json::from_str(&ConfigLoader::to_json(config)?)
        .context("Failed to re-read effective configuration")?;

    Ok(ConfigInfo {
        flavor: flavor.to_string(),
        url: config.url.clone(),
        destination: DestinationInfo {
            kind: flavor.destination_kind(),
            expression: config.target.destination().to_string(),
        },
        documents: DocumentInfo {
            id_template: config.document_id.clone(),
            timestamp_destination: config.timestamp_destination.clone(),
        },
        batching: BatchingInfo {
            batch_size: config.batch_size,
            timeout_secs: config.timeout_secs,
            max_attempts: config.retry.max_attempts,
            initial_delay_ms: config.retry.initial_delay_ms,
            max_delay_ms: config.retry.max_delay_ms,
        },
        tls: TlsInfo {
            verification: verification(config),
            certificate_authority: config
                .ssl
                .certificate_authorities
                .first()
                .map(|p| p.display().to_string()),
            truststore: config
                .ssl
                .truststore_path
                .as_ref()
                .map(|p| p.display().to_string()),
            protocols: config.ssl.supported_protocols.clone(),
        },
        effective,
    })
}

fn print_config_info(config: &OutputConfig) -> Result<()> {
    let flavor = config.target.flavor();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Search Shipper Configuration                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🔗 Endpoint");
    println!("   ├─ URL: {}", config.url);
    println!("   ├─ Product: {}", flavor);
    match &config.target {
        TargetConfig::AppSearch { engine, .. } => println!("   └─ Engine: {}", engine),
        TargetConfig::WorkplaceSearch { source, .. } => println!("   └─ Source: {}", source),
    }

    println!("\n📄 Documents");
    println!(
        "   ├─ Id template: {}",
        config.document_id.as_deref().unwrap_or("(server assigned)")
    );
    println!(
        "   └─ Timestamp copy: {}",
        config.timestamp_destination.as_deref().unwrap_or("(none)")
    );

    println!("\n📦 Batching");
    println!("   ├─ Batch size: {}", config.batch_size);
    println!("   ├─ Timeout: {}s", config.timeout_secs);
    println!(
        "   └─ Retry: {} attempts, {}ms..{}ms x{}",
        config.retry.max_attempts,
        config.retry.initial_delay_ms,
        config.retry.max_delay_ms,
        config.retry.multiplier
    );

    println!("\n🔒 TLS");
    println!("   ├─ Verification: {}", verification(config));
    if let Some(ca) = config.ssl.certificate_authorities.first() {
        println!("   ├─ CA: {}", ca.display());
    }
    if let Some(ref truststore) = config.ssl.truststore_path {
        println!("   ├─ Truststore: {}", truststore.display());
    }
    if config.ssl.supported_protocols.is_empty() {
        println!("   └─ Protocols: (backend default)");
    } else {
        println!("   └─ Protocols: {}", config.ssl.supported_protocols.join(", "));
    }

    println!("\n📝 Effective configuration (secrets redacted)\n");
    println!("{}", ConfigLoader::to_toml(config)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::ConfigFormat;

    #[test]
    fn test_info_redacts_credentials() {
        let config = ConfigLoader::load_from_str(
            r#"
url = "https://localhost:3002"

[target]
kind = "app_search"
api_key = "private-secret"
engine = "%{service}"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let info = build_config_info(&config).unwrap();
        assert_eq!(info.destination.kind, "engine");
        assert_eq!(info.tls.verification, "full");
        assert_eq!(info.batching.batch_size, 100);

        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("private-secret"));
    }
}

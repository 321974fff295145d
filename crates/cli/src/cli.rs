//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Search Shipper - bulk-index NDJSON records into Elastic Enterprise Search
#[derive(Parser, Debug)]
#[command(
    name = "search-shipper",
    author,
    version,
    about = "Ship NDJSON records to App Search engines or Workplace Search sources",
    long_about = "Reads newline-delimited JSON records, routes each record to an engine or \n\
                  content source, and bulk-indexes them in ordered batches. Refused \n\
                  documents are logged and dropped; transport failures are retried."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SEARCH_SHIPPER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SEARCH_SHIPPER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read records and index them
    Run(RunArgs),

    /// Validate configuration file without sending documents
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "shipper.toml",
        env = "SEARCH_SHIPPER_CONFIG"
    )]
    pub config: PathBuf,

    /// NDJSON input file ("-" or absent reads stdin)
    #[arg(short, long, env = "SEARCH_SHIPPER_INPUT")]
    pub input: Option<PathBuf>,

    /// Override the Enterprise Search URL from configuration
    #[arg(long, env = "ENTERPRISE_SEARCH_URL")]
    pub url: Option<String>,

    /// Records handed to the dispatcher per call
    #[arg(long, default_value = "1000", env = "SEARCH_SHIPPER_CHUNK_SIZE")]
    pub chunk_size: usize,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "SEARCH_SHIPPER_TIMEOUT")]
    pub timeout: u64,

    /// Route and map records but acknowledge them locally instead of sending
    #[arg(long)]
    pub dry_run: bool,

    /// Do not probe the remote API before the first batch
    #[arg(long)]
    pub skip_connection_check: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SEARCH_SHIPPER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "shipper.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,

    /// Also probe the remote API with the configured credentials
    #[arg(long)]
    pub check_connection: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "shipper.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["search-shipper", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.config, PathBuf::from("shipper.toml"));
        assert_eq!(args.chunk_size, 1000);
        assert!(args.input.is_none());
        assert!(!args.dry_run);
        assert!(!args.skip_connection_check);
    }

    #[test]
    fn run_flags() {
        let cli = Cli::try_parse_from([
            "search-shipper",
            "-vv",
            "run",
            "--input",
            "events.ndjson",
            "--dry-run",
            "--skip-connection-check",
            "--chunk-size",
            "50",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.input, Some(PathBuf::from("events.ndjson")));
        assert_eq!(args.chunk_size, 50);
        assert!(args.dry_run);
        assert!(args.skip_connection_check);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["search-shipper", "-q", "-v", "info"]).is_err());
    }
}

//! OutputConfig - Config Loader output
//!
//! Describes the remote endpoint, destination routing, document shaping,
//! batching, retry and TLS options.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::{ApiFlavor, Password};

/// Complete output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OutputConfig {
    /// Enterprise Search base URL (e.g. "https://localhost:3002")
    #[validate(url)]
    pub url: String,

    /// Product, credentials and destination expression
    pub target: TargetConfig,

    /// Template evaluated per record into the document `id`
    #[serde(default)]
    pub document_id: Option<String>,

    /// Field that receives a copy of `@timestamp`
    #[serde(default)]
    #[validate(length(min = 1))]
    pub timestamp_destination: Option<String>,

    /// Maximum documents per request
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 100))]
    pub batch_size: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    /// Transport retry policy
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,

    /// Flat TLS options
    #[serde(default)]
    pub ssl: SslOptions,
}

fn default_batch_size() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    60
}

/// Remote product selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetConfig {
    /// App Search engine(s)
    AppSearch {
        /// Private API key
        api_key: Password,
        /// Engine name, may contain `%{field}` placeholders
        engine: String,
    },
    /// Workplace Search custom content source(s)
    WorkplaceSearch {
        /// Content source access token
        access_token: Password,
        /// Content source id, may contain `%{field}` placeholders
        source: String,
    },
}

impl TargetConfig {
    pub fn flavor(&self) -> ApiFlavor {
        match self {
            Self::AppSearch { .. } => ApiFlavor::AppSearch,
            Self::WorkplaceSearch { .. } => ApiFlavor::WorkplaceSearch,
        }
    }

    /// Destination template (engine or source)
    pub fn destination(&self) -> &str {
        match self {
            Self::AppSearch { engine, .. } => engine,
            Self::WorkplaceSearch { source, .. } => source,
        }
    }

    /// Bearer credential
    pub fn credential(&self) -> &Password {
        match self {
            Self::AppSearch { api_key, .. } => api_key,
            Self::WorkplaceSearch { access_token, .. } => access_token,
        }
    }

    /// Config key holding the destination template
    pub fn destination_field(&self) -> &'static str {
        match self {
            Self::AppSearch { .. } => "target.engine",
            Self::WorkplaceSearch { .. } => "target.source",
        }
    }

    /// Config key holding the credential
    pub fn credential_field(&self) -> &'static str {
        match self {
            Self::AppSearch { .. } => "target.api_key",
            Self::WorkplaceSearch { .. } => "target.access_token",
        }
    }
}

/// Exponential backoff for transport failures
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RetryConfig {
    /// Total attempts per batch, first one included
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 100))]
    pub max_attempts: u32,

    /// Delay before the first retry (ms)
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on any single delay (ms)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor between consecutive delays
    #[serde(default = "default_multiplier")]
    #[validate(range(min = 1.0))]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

/// Peer certificate verification mode as written in configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SslVerificationMode {
    /// Verify chain and hostname
    #[default]
    Full,
    /// Accept any certificate
    None,
}

/// Flat TLS options, turned into a transport configuration at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SslOptions {
    #[serde(default)]
    pub verification_mode: SslVerificationMode,

    /// PEM CA files; only the first entry is honored
    #[serde(default, deserialize_with = "one_or_many")]
    pub certificate_authorities: Vec<PathBuf>,

    #[serde(default)]
    pub truststore_path: Option<PathBuf>,

    /// pem / der / pkcs12 / jks; inferred from the path when absent
    #[serde(default)]
    pub truststore_type: Option<String>,

    #[serde(default)]
    pub truststore_password: Option<Password>,

    /// IANA cipher suite names
    #[serde(default, deserialize_with = "one_or_many")]
    pub cipher_suites: Vec<String>,

    /// e.g. "TLSv1.2", "TLSv1.3"
    #[serde(default, deserialize_with = "one_or_many")]
    pub supported_protocols: Vec<String>,
}

/// Accept either a single value or a list
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

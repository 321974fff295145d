//! Transport Configurator - flat `ssl` options -> immutable TLS configuration

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::ring::{cipher_suite, default_provider};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme, SupportedCipherSuite,
    SupportedProtocolVersion,
};
use tracing::{instrument, warn};

use contracts::{IndexerError, SslOptions, SslVerificationMode};

/// Map an IANA cipher suite name to the rustls implementation
fn rustls_cipher_suite(name: &str) -> Option<SupportedCipherSuite> {
    let suite = match name {
        "TLS_AES_128_GCM_SHA256" => cipher_suite::TLS13_AES_128_GCM_SHA256,
        "TLS_AES_256_GCM_SHA384" => cipher_suite::TLS13_AES_256_GCM_SHA384,
        "TLS_CHACHA20_POLY1305_SHA256" => cipher_suite::TLS13_CHACHA20_POLY1305_SHA256,
        "TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256" => {
            cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256
        }
        "TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384" => {
            cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384
        }
        "TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256" => {
            cipher_suite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256
        }
        "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256" => {
            cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256
        }
        "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384" => {
            cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384
        }
        "TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256" => {
            cipher_suite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256
        }
        _ => return None,
    };
    Some(suite)
}

/// Peer verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Chain and hostname are checked
    Strict,
    /// Any certificate is accepted
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruststoreType {
    Pem,
    Der,
    Pkcs12,
    Jks,
}

impl TruststoreType {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "pem" | "crt" => Some(Self::Pem),
            "der" | "cer" => Some(Self::Der),
            "pkcs12" | "p12" | "pfx" => Some(Self::Pkcs12),
            "jks" => Some(Self::Jks),
            _ => None,
        }
    }

    fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::parse)
    }
}

impl fmt::Display for TruststoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pem => "pem",
            Self::Der => "der",
            Self::Pkcs12 => "pkcs12",
            Self::Jks => "jks",
        };
        f.write_str(name)
    }
}

/// Truststore with its password already resolved
#[derive(Clone, PartialEq, Eq)]
pub struct Truststore {
    pub path: PathBuf,
    pub kind: TruststoreType,
    pub password: Option<String>,
}

impl fmt::Debug for Truststore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Truststore")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("password", &self.password.as_ref().map(|_| "<password>"))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsProtocol {
    V1_2,
    V1_3,
}

impl TlsProtocol {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "TLSv1.2" => Some(Self::V1_2),
            "TLSv1.3" => Some(Self::V1_3),
            _ => None,
        }
    }

    fn rustls_version(self) -> &'static SupportedProtocolVersion {
        match self {
            Self::V1_2 => &rustls::version::TLS12,
            Self::V1_3 => &rustls::version::TLS13,
        }
    }
}

/// Immutable TLS/connection configuration
///
/// Built once by [`build`]; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    verification: Verification,
    ca_file: Option<PathBuf>,
    truststore: Option<Truststore>,
    cipher_suites: Option<Vec<String>>,
    protocols: Option<Vec<TlsProtocol>>,
}

impl TransportConfig {
    pub fn verification(&self) -> Verification {
        self.verification
    }

    pub fn is_strict(&self) -> bool {
        self.verification == Verification::Strict
    }

    pub fn ca_file(&self) -> Option<&Path> {
        self.ca_file.as_deref()
    }

    pub fn truststore(&self) -> Option<&Truststore> {
        self.truststore.as_ref()
    }

    pub fn cipher_suites(&self) -> Option<&[String]> {
        self.cipher_suites.as_deref()
    }

    pub fn protocols(&self) -> Option<&[TlsProtocol]> {
        self.protocols.as_deref()
    }

    /// Lowest and highest enabled protocol
    pub fn protocol_range(&self) -> Option<(TlsProtocol, TlsProtocol)> {
        let protocols = self.protocols.as_ref()?;
        Some((*protocols.iter().min()?, *protocols.iter().max()?))
    }

    /// rustls client configuration restricted to the configured cipher suites
    ///
    /// `roots` are trusted on top of the bundled web PKI roots. Protocol
    /// versions and verification mode are applied as well.
    ///
    /// # Errors
    /// No configured suite can be used with the configured protocols, or a root is invalid.
    pub fn rustls_client_config(
        &self,
        roots: &[CertificateDer<'static>],
    ) -> Result<ClientConfig, IndexerError> {
        let mut provider = default_provider();
        if let Some(names) = &self.cipher_suites {
            provider.cipher_suites = names
                .iter()
                .filter_map(|name| rustls_cipher_suite(name))
                .collect();
        }
        let provider = Arc::new(provider);

        let versions: Vec<&'static SupportedProtocolVersion> = match &self.protocols {
            Some(protocols) => protocols.iter().map(|p| p.rustls_version()).collect(),
            None => rustls::DEFAULT_VERSIONS.to_vec(),
        };

        let builder = ClientConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(&versions)
            .map_err(|e| {
                IndexerError::configuration(
                    "ssl.cipher_suites",
                    format!("no usable cipher suite for the configured protocols: {e}"),
                )
            })?;

        let config = match self.verification {
            Verification::Strict => {
                let mut store = RootCertStore {
                    roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
                };
                for root in roots {
                    store.add(root.clone()).map_err(|e| {
                        IndexerError::configuration(
                            "ssl",
                            format!("invalid trusted certificate: {e}"),
                        )
                    })?;
                }
                builder.with_root_certificates(store).with_no_client_auth()
            }
            Verification::Disabled => builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
                .with_no_client_auth(),
        };
        Ok(config)
    }
}

/// Skips chain and hostname checks; handshake signatures are still verified
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            verification: Verification::Strict,
            ca_file: None,
            truststore: None,
            cipher_suites: None,
            protocols: None,
        }
    }
}

/// Build the transport configuration from flat options
///
/// # Errors
/// Inconsistent truststore options, unknown truststore type, protocol or cipher suite.
#[instrument(name = "transport_configurator_build", skip(options))]
pub fn build(options: &SslOptions) -> Result<TransportConfig, IndexerError> {
    let verification = match options.verification_mode {
        SslVerificationMode::Full => Verification::Strict,
        SslVerificationMode::None => Verification::Disabled,
    };

    let ca_file = options.certificate_authorities.first().cloned();
    if options.certificate_authorities.len() > 1 {
        warn!(
            configured = options.certificate_authorities.len(),
            using = ?ca_file,
            "Multiple certificate authorities configured, only the first one is used"
        );
    }

    let truststore = build_truststore(options)?;
    if ca_file.is_some() && truststore.is_some() {
        return Err(IndexerError::configuration(
            "ssl.truststore_path",
            "cannot be combined with ssl.certificate_authorities",
        ));
    }

    let cipher_suites = non_empty(&options.cipher_suites)
        .map(|suites| {
            suites
                .iter()
                .map(|suite| {
                    if rustls_cipher_suite(suite).is_some() {
                        Ok(suite.clone())
                    } else {
                        Err(IndexerError::configuration(
                            "ssl.cipher_suites",
                            format!("unsupported cipher suite '{suite}'"),
                        ))
                    }
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let protocols = non_empty(&options.supported_protocols)
        .map(|protocols| {
            protocols
                .iter()
                .map(|p| {
                    TlsProtocol::parse(p).ok_or_else(|| {
                        IndexerError::configuration(
                            "ssl.supported_protocols",
                            format!("unsupported protocol '{p}', expected TLSv1.2 or TLSv1.3"),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    Ok(TransportConfig {
        verification,
        ca_file,
        truststore,
        cipher_suites,
        protocols,
    })
}

fn build_truststore(options: &SslOptions) -> Result<Option<Truststore>, IndexerError> {
    let Some(path) = &options.truststore_path else {
        if options.truststore_password.is_some() {
            return Err(IndexerError::configuration(
                "ssl.truststore_password",
                "set without ssl.truststore_path",
            ));
        }
        if options.truststore_type.is_some() {
            return Err(IndexerError::configuration(
                "ssl.truststore_type",
                "set without ssl.truststore_path",
            ));
        }
        return Ok(None);
    };

    let kind = match &options.truststore_type {
        Some(kind) => TruststoreType::parse(kind).ok_or_else(|| {
            IndexerError::configuration(
                "ssl.truststore_type",
                format!("unknown truststore type '{kind}'"),
            )
        })?,
        None => TruststoreType::from_path(path).ok_or_else(|| {
            IndexerError::configuration(
                "ssl.truststore_type",
                format!("cannot infer type of '{}'", path.display()),
            )
        })?,
    };

    if options.truststore_password.is_some()
        && matches!(kind, TruststoreType::Pem | TruststoreType::Der)
    {
        warn!(%kind, "ssl.truststore_password is ignored for unencrypted truststores");
    }

    Ok(Some(Truststore {
        path: path.clone(),
        kind,
        password: options
            .truststore_password
            .as_ref()
            .map(|p| p.expose().to_string()),
    }))
}

fn non_empty(values: &[String]) -> Option<&[String]> {
    (!values.is_empty()).then_some(values)
}

//! HttpTransport - reqwest client built from a TransportConfig

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::tls::Version;
use p12_keystore::{KeyStore, KeyStoreEntry};
use reqwest::{Certificate, Client, Url};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use serde_json::Value;
use std::error::Error as StdError;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

use contracts::{DocumentTransport, IndexerError, Password, TransportResponse};

use super::tls::{TlsProtocol, TransportConfig, TruststoreType, Verification};

/// Bearer-authenticated JSON transport over HTTP(S)
///
/// The inner client pools connections and is cheap to clone.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
    endpoint: String,
}

impl HttpTransport {
    /// Build the client; nothing is sent
    ///
    /// # Errors
    /// Invalid URL, unreadable CA/truststore, wrong truststore password, jks truststore,
    /// cipher suites unusable with the configured protocols.
    #[instrument(name = "http_transport_new", skip(credential, tls))]
    pub fn new(
        url: &str,
        credential: &Password,
        timeout: Duration,
        tls: &TransportConfig,
    ) -> Result<Self, IndexerError> {
        let base = Url::parse(url)
            .map_err(|e| IndexerError::configuration("url", format!("invalid url '{url}': {e}")))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(IndexerError::configuration(
                "url",
                format!("expected an http(s) url, got '{url}'"),
            ));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
            .map_err(|_| {
                IndexerError::configuration("target", "credential is not a valid header value")
            })?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let roots = trusted_roots(tls)?;
        let builder = Client::builder().default_headers(headers).timeout(timeout);

        // reqwest has no cipher selection, so a restricted suite list needs
        // a rustls config of our own
        let builder = if tls.cipher_suites().is_some() {
            builder.use_preconfigured_tls(tls.rustls_client_config(&roots)?)
        } else {
            let mut builder = builder.use_rustls_tls();
            if tls.verification() == Verification::Disabled {
                builder = builder.danger_accept_invalid_certs(true);
            }
            for root in &roots {
                let certificate = Certificate::from_der(root.as_ref()).map_err(|e| {
                    IndexerError::configuration("ssl", format!("invalid trusted certificate: {e}"))
                })?;
                builder = builder.add_root_certificate(certificate);
            }
            if let Some((min, max)) = tls.protocol_range() {
                builder = builder
                    .min_tls_version(tls_version(min))
                    .max_tls_version(tls_version(max));
            }
            builder
        };

        let client = builder
            .build()
            .map_err(|e| IndexerError::configuration("ssl", format!("http client: {e}")))?;

        debug!(endpoint = %base, strict = tls.is_strict(), "HttpTransport ready");

        Ok(Self {
            client,
            endpoint: base.to_string(),
            base,
        })
    }

    fn url(&self, path: &[String]) -> Result<Url, IndexerError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| IndexerError::transport(&self.endpoint, "url cannot carry a path"))?
            .pop_if_empty()
            .extend(path);
        Ok(url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        target: &Url,
    ) -> Result<TransportResponse, IndexerError> {
        let response = request
            .send()
            .await
            .map_err(|e| classify(target.as_str(), &e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(target.as_str(), &e))?;
        Ok(TransportResponse::new(status, body))
    }
}

impl DocumentTransport for HttpTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_json(
        &self,
        path: &[String],
        body: &Value,
    ) -> Result<TransportResponse, IndexerError> {
        let url = self.url(path)?;
        self.send(self.client.post(url.clone()).json(body), &url).await
    }

    async fn get(&self, path: &[String]) -> Result<TransportResponse, IndexerError> {
        let url = self.url(path)?;
        self.send(self.client.get(url.clone()), &url).await
    }
}

fn tls_version(protocol: TlsProtocol) -> Version {
    match protocol {
        TlsProtocol::V1_2 => Version::TLS_1_2,
        TlsProtocol::V1_3 => Version::TLS_1_3,
    }
}

fn trusted_roots(tls: &TransportConfig) -> Result<Vec<CertificateDer<'static>>, IndexerError> {
    if let Some(path) = tls.ca_file() {
        return read_pem_bundle("ssl.certificate_authorities", path);
    }

    let Some(truststore) = tls.truststore() else {
        return Ok(Vec::new());
    };
    match truststore.kind {
        TruststoreType::Pem => read_pem_bundle("ssl.truststore_path", &truststore.path),
        TruststoreType::Der => {
            let bytes = read_file("ssl.truststore_path", &truststore.path)?;
            Ok(vec![CertificateDer::from(bytes)])
        }
        TruststoreType::Pkcs12 => read_pkcs12(
            &truststore.path,
            truststore.password.as_deref().unwrap_or_default(),
        ),
        TruststoreType::Jks => Err(IndexerError::configuration(
            "ssl.truststore_type",
            "jks truststores cannot be loaded, convert to pkcs12, pem or der",
        )),
    }
}

fn read_pem_bundle(field: &str, path: &Path) -> Result<Vec<CertificateDer<'static>>, IndexerError> {
    let bytes = read_file(field, path)?;
    let certificates = CertificateDer::pem_slice_iter(&bytes)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| IndexerError::configuration(field, format!("invalid PEM: {e}")))?;
    if certificates.is_empty() {
        return Err(IndexerError::configuration(
            field,
            format!("no certificate found in '{}'", path.display()),
        ));
    }
    Ok(certificates)
}

/// Trusted certificate entries of a password-protected PKCS#12 store
fn read_pkcs12(path: &Path, password: &str) -> Result<Vec<CertificateDer<'static>>, IndexerError> {
    let bytes = read_file("ssl.truststore_path", path)?;
    let keystore = KeyStore::from_pkcs12(&bytes, password).map_err(|e| {
        IndexerError::configuration(
            "ssl.truststore_password",
            format!("cannot open pkcs12 truststore '{}': {e}", path.display()),
        )
    })?;
    let certificates: Vec<_> = keystore
        .entries()
        .filter_map(|(_, entry)| match entry {
            KeyStoreEntry::Certificate(certificate) => {
                Some(CertificateDer::from(certificate.as_der().to_vec()))
            }
            _ => None,
        })
        .collect();
    if certificates.is_empty() {
        return Err(IndexerError::configuration(
            "ssl.truststore_path",
            format!("no trusted certificate in '{}'", path.display()),
        ));
    }
    Ok(certificates)
}

fn read_file(field: &str, path: &Path) -> Result<Vec<u8>, IndexerError> {
    std::fs::read(path).map_err(|e| {
        IndexerError::configuration(field, format!("cannot read '{}': {e}", path.display()))
    })
}

/// Map a reqwest failure, singling out certificate validation
fn classify(target: &str, err: &reqwest::Error) -> IndexerError {
    let mut chain = Vec::new();
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        chain.push(e.to_string());
        source = e.source();
    }
    let message = chain.join(": ");

    let certificate = chain
        .iter()
        .any(|m| m.contains("certificate") || m.contains("UnknownIssuer"));
    if certificate {
        IndexerError::certificate_path(target, message)
    } else if err.is_timeout() {
        IndexerError::transport(target, format!("request timed out: {message}"))
    } else {
        IndexerError::transport(target, message)
    }
}

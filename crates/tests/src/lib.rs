//! # Integration Tests
//!
//! End-to-end tests over real HTTP.
//!
//! Covers:
//! - Config file -> dispatcher -> mock Enterprise Search server
//! - Both response layouts, refused documents, retries and lost batches
//! - TLS verification, truststores and cipher restriction against an in-process server

#[cfg(test)]
mod contract_tests {
    use contracts::{ApiFlavor, Destination};

    #[test]
    fn test_documents_paths() {
        let engine = Destination::from("logs");
        assert_eq!(
            ApiFlavor::AppSearch.documents_path(&engine).join("/"),
            "api/as/v1/engines/logs/documents"
        );
        assert_eq!(
            ApiFlavor::WorkplaceSearch.documents_path(&engine).join("/"),
            "api/ws/v1/sources/logs/documents/bulk_create"
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashSet;
    use std::io::Write;

    use config_loader::ConfigLoader;
    use contracts::{ApiFlavor, IndexerError, OutputConfig, Record};
    use dispatcher::{DispatcherBuilder, HttpTransport, IndexingDispatcher};
    use observability::DispatchMetricsAggregator;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    /// Answers a bulk request with one outcome per submitted document
    struct EchoOutcomes {
        flavor: ApiFlavor,
        refused_ids: HashSet<String>,
    }

    impl EchoOutcomes {
        fn accepting(flavor: ApiFlavor) -> Self {
            Self {
                flavor,
                refused_ids: HashSet::new(),
            }
        }

        fn refusing(flavor: ApiFlavor, ids: &[&str]) -> Self {
            Self {
                flavor,
                refused_ids: ids.iter().map(|id| id.to_string()).collect(),
            }
        }
    }

    impl Respond for EchoOutcomes {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let documents: Vec<Value> = serde_json::from_slice(&request.body).unwrap();
            let outcomes: Vec<Value> = documents
                .iter()
                .map(|document| {
                    let id = document["id"].as_str().unwrap_or_default().to_string();
                    if self.refused_ids.contains(&id) {
                        json!({"id": null, "errors": ["price must be a number"]})
                    } else {
                        json!({"id": id, "errors": []})
                    }
                })
                .collect();
            let body = match self.flavor {
                ApiFlavor::AppSearch => Value::Array(outcomes),
                ApiFlavor::WorkplaceSearch => json!({ "results": outcomes }),
            };
            ResponseTemplate::new(200).set_body_json(body)
        }
    }

    pub(crate) const APP_SEARCH_TARGET: &str = r#"
[target]
kind = "app_search"
api_key = "private-key"
engine = "%{service}"
"#;

    const WORKPLACE_SEARCH_TARGET: &str = r#"
[target]
kind = "workplace_search"
access_token = "ws-token"
source = "%{service}"
"#;

    /// Write a config file and load it the way the CLI does
    pub(crate) fn load_config(url: &str, target: &str, batch_size: usize) -> OutputConfig {
        let content = format!(
            r#"
url = "{url}"
document_id = "%{{uid}}"
timestamp_destination = "created_at"
batch_size = {batch_size}
timeout_secs = 5

[retry]
max_attempts = 3
initial_delay_ms = 1
max_delay_ms = 5
{target}"#
        );
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        ConfigLoader::load_from_path(file.path()).unwrap()
    }

    pub(crate) fn http_dispatcher(config: OutputConfig) -> IndexingDispatcher<HttpTransport> {
        DispatcherBuilder::new(config).build().unwrap()
    }

    pub(crate) fn records(services: &[&str]) -> Vec<Record> {
        services
            .iter()
            .enumerate()
            .map(|(i, service)| {
                Record::from_json_line(
                    &json!({
                        "uid": format!("doc-{i}"),
                        "service": service,
                        "message": format!("event {i}"),
                        "@timestamp": "2024-05-01T10:00:00Z",
                        "@version": "1"
                    })
                    .to_string(),
                )
                .unwrap()
            })
            .collect()
    }

    fn submitted(requests: &[Request], url_path: &str) -> Vec<Vec<Value>> {
        requests
            .iter()
            .filter(|r| r.url.path() == url_path)
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_app_search_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer private-key"))
            .respond_with(EchoOutcomes::accepting(ApiFlavor::AppSearch))
            .mount(&server)
            .await;

        let dispatcher = http_dispatcher(load_config(&server.uri(), APP_SEARCH_TARGET, 2));
        let summary = dispatcher
            .receive(&records(&["web", "db", "web", "web", "db"]))
            .await;

        assert_eq!(summary.received, 5);
        assert_eq!(summary.indexed, 5);
        assert!(summary.is_clean());

        let requests = server.received_requests().await.unwrap();
        let web = submitted(&requests, "/api/as/v1/engines/web/documents");
        let db = submitted(&requests, "/api/as/v1/engines/db/documents");
        assert_eq!(web.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(db.iter().map(Vec::len).collect::<Vec<_>>(), vec![2]);

        // Order within a destination follows the input
        let web_ids: Vec<&str> = web
            .iter()
            .flatten()
            .map(|d| d["id"].as_str().unwrap())
            .collect();
        assert_eq!(web_ids, vec!["doc-0", "doc-2", "doc-3"]);

        let first = &web[0][0];
        assert!(first.get("@timestamp").is_none());
        assert!(first.get("@version").is_none());
        assert_eq!(first["created_at"], "2024-05-01T10:00:00Z");
        assert_eq!(first["message"], "event 0");
    }

    #[tokio::test]
    async fn test_workplace_search_refused_documents_are_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ws/v1/sources/web/documents/bulk_create"))
            .and(header("authorization", "Bearer ws-token"))
            .respond_with(EchoOutcomes::refusing(
                ApiFlavor::WorkplaceSearch,
                &["doc-1"],
            ))
            .mount(&server)
            .await;

        let config = load_config(&server.uri(), WORKPLACE_SEARCH_TARGET, 100);
        let dispatcher = http_dispatcher(config);
        let summary = dispatcher.receive(&records(&["web", "web", "web"])).await;

        assert_eq!(summary.indexed, 2);
        assert_eq!(summary.dropped.len(), 1);
        assert_eq!(summary.dropped[0].position, 1);
        assert_eq!(summary.dropped[0].document.get("uid"), Some(&json!("doc-1")));
        assert!(summary.dropped[0].errors[0].contains("price"));
        assert!(summary.failed_batches.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(EchoOutcomes::accepting(ApiFlavor::AppSearch))
            .mount(&server)
            .await;

        let dispatcher = http_dispatcher(load_config(&server.uri(), APP_SEARCH_TARGET, 100));
        let summary = dispatcher.receive(&records(&["web", "web"])).await;

        assert_eq!(summary.retries, 1);
        assert_eq!(summary.indexed, 2);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_lose_only_that_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/as/v1/engines/db/documents"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/as/v1/engines/web/documents"))
            .respond_with(EchoOutcomes::accepting(ApiFlavor::AppSearch))
            .mount(&server)
            .await;

        let dispatcher = http_dispatcher(load_config(&server.uri(), APP_SEARCH_TARGET, 100));
        let summary = dispatcher.receive(&records(&["db", "web", "db"])).await;

        assert_eq!(summary.indexed, 1);
        assert_eq!(summary.failed_batches.len(), 1);

        let failure = &summary.failed_batches[0];
        assert_eq!(failure.destination, "db");
        assert_eq!(failure.positions, vec![0, 2]);
        assert!(matches!(
            failure.error,
            IndexerError::RetriesExhausted { attempts: 3, .. }
        ));

        let mut aggregator = DispatchMetricsAggregator::new();
        aggregator.update(&summary, 1.0);
        assert_eq!(aggregator.total_failed_documents, 2);
        assert_eq!(
            aggregator.failures_by_kind.get("retries_exhausted"),
            Some(&1)
        );
    }

    #[tokio::test]
    async fn test_rejected_request_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "Unauthorized"})),
            )
            .mount(&server)
            .await;

        let dispatcher = http_dispatcher(load_config(&server.uri(), APP_SEARCH_TARGET, 100));
        let summary = dispatcher.receive(&records(&["web"])).await;

        assert_eq!(summary.retries, 0);
        assert!(matches!(
            summary.failed_batches[0].error,
            IndexerError::RequestRejected { status: 401, .. }
        ));
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_connection_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/as/v1/engines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;

        let dispatcher = http_dispatcher(load_config(&server.uri(), APP_SEARCH_TARGET, 100));
        dispatcher.check_connection().await.unwrap();

        let constant_engine = APP_SEARCH_TARGET.replace("%{service}", "missing");
        let dispatcher = http_dispatcher(load_config(&server.uri(), &constant_engine, 100));
        let err = dispatcher.check_connection().await.unwrap_err();
        assert!(err.is_configuration());
    }
}

#[cfg(test)]
mod tls_tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{DocumentTransport, IndexerError, Password, SslOptions};
    use dispatcher::transport::tls;
    use dispatcher::HttpTransport;
    use p12_keystore::{KeyStore, KeyStoreEntry};
    use rustls::crypto::ring::{cipher_suite, default_provider};
    use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
    use rustls::{ServerConfig, SupportedCipherSuite};
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_rustls::TlsAcceptor;

    use crate::e2e_tests::{http_dispatcher, load_config, records, APP_SEARCH_TARGET};

    /// Body accepted by App Search for the single record built by `records(&["web"])`
    const ACCEPTED: &str = r#"[{"id": "doc-0", "errors": []}]"#;

    /// HTTPS server presenting a freshly generated self-signed certificate
    struct TlsServer {
        url: String,
        certificate: CertificateDer<'static>,
        certificate_pem: String,
    }

    impl TlsServer {
        async fn start() -> Self {
            Self::start_with_suites(None).await
        }

        /// Only the given suites are offered when set
        async fn start_with_suites(suites: Option<Vec<SupportedCipherSuite>>) -> Self {
            let certified =
                rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()]).unwrap();
            let certificate = certified.cert.der().clone();
            let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
                certified.key_pair.serialize_der(),
            ));

            let mut provider = default_provider();
            if let Some(suites) = suites {
                provider.cipher_suites = suites;
            }
            let config = ServerConfig::builder_with_provider(Arc::new(provider))
                .with_safe_default_protocol_versions()
                .unwrap()
                .with_no_client_auth()
                .with_single_cert(vec![certificate.clone()], key)
                .unwrap();
            let acceptor = TlsAcceptor::from(Arc::new(config));

            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let acceptor = acceptor.clone();
                    tokio::spawn(async move {
                        if let Ok(mut stream) = acceptor.accept(stream).await {
                            let _ = answer(&mut stream, ACCEPTED).await;
                        }
                    });
                }
            });

            Self {
                url: format!("https://127.0.0.1:{port}"),
                certificate,
                certificate_pem: certified.cert.pem(),
            }
        }

        fn ca_file(&self) -> tempfile::NamedTempFile {
            let mut file = tempfile::Builder::new().suffix(".crt").tempfile().unwrap();
            file.write_all(self.certificate_pem.as_bytes()).unwrap();
            file
        }

        fn pkcs12_truststore(&self, password: &str) -> tempfile::NamedTempFile {
            let mut keystore = KeyStore::new();
            keystore.add_entry(
                "search-ca",
                KeyStoreEntry::Certificate(
                    p12_keystore::Certificate::from_der(&self.certificate).unwrap(),
                ),
            );
            let bytes = keystore.writer(password).write().unwrap();
            let mut file = tempfile::Builder::new().suffix(".p12").tempfile().unwrap();
            file.write_all(&bytes).unwrap();
            file
        }
    }

    /// Read one HTTP/1.1 request and answer it with `body`
    async fn answer<S>(stream: &mut S, body: &str) -> std::io::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            request.extend_from_slice(&buf[..n]);
            if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&request[..header_end]).to_ascii_lowercase();
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while request.len() < header_end + content_length {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\
             connection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await
    }

    fn transport(url: &str, options: &SslOptions) -> Result<HttpTransport, IndexerError> {
        let tls = tls::build(options)?;
        HttpTransport::new(url, &Password::new("private-key"), Duration::from_secs(5), &tls)
    }

    fn engines_path() -> Vec<String> {
        ["api", "as", "v1", "engines"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_self_signed_certificate_rejected_by_full_verification() {
        let server = TlsServer::start().await;

        let err = transport(&server.url, &SslOptions::default())
            .unwrap()
            .get(&engines_path())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::CertificatePath { .. }), "{err}");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_certificate_error_surfaces_through_exhausted_retries() {
        let server = TlsServer::start().await;

        let dispatcher = http_dispatcher(load_config(&server.url, APP_SEARCH_TARGET, 100));
        let summary = dispatcher.receive(&records(&["web"])).await;

        assert_eq!(summary.indexed, 0);
        assert_eq!(summary.failed_batches.len(), 1);
        let error = &summary.failed_batches[0].error;
        assert!(matches!(error, IndexerError::RetriesExhausted { attempts: 3, .. }));
        assert!(error.is_certificate_error());
        assert_eq!(error.kind(), "retries_exhausted_certificate");
    }

    #[tokio::test]
    async fn test_verification_none_accepts_self_signed_certificate() {
        let server = TlsServer::start().await;

        let target = format!("{APP_SEARCH_TARGET}\n[ssl]\nverification_mode = \"none\"\n");
        let dispatcher = http_dispatcher(load_config(&server.url, &target, 100));
        let summary = dispatcher.receive(&records(&["web"])).await;

        assert_eq!(summary.indexed, 1);
        assert!(summary.is_clean());
    }

    #[tokio::test]
    async fn test_certificate_authority_file_is_trusted() {
        let server = TlsServer::start().await;
        let ca = server.ca_file();

        let options = SslOptions {
            certificate_authorities: vec![ca.path().to_path_buf()],
            ..Default::default()
        };
        let response = transport(&server.url, &options)
            .unwrap()
            .get(&engines_path())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_pkcs12_truststore_is_trusted() {
        let server = TlsServer::start().await;
        let truststore = server.pkcs12_truststore("changeit");

        let options = SslOptions {
            truststore_path: Some(truststore.path().to_path_buf()),
            truststore_password: Some(Password::new("changeit")),
            ..Default::default()
        };
        let response = transport(&server.url, &options)
            .unwrap()
            .get(&engines_path())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_cipher_suites_restrict_the_handshake() {
        let server =
            TlsServer::start_with_suites(Some(vec![cipher_suite::TLS13_AES_256_GCM_SHA384]))
                .await;
        let ca = server.ca_file();
        let options = |suite: &str| SslOptions {
            certificate_authorities: vec![ca.path().to_path_buf()],
            supported_protocols: vec!["TLSv1.3".into()],
            cipher_suites: vec![suite.to_string()],
            ..Default::default()
        };

        let err = transport(&server.url, &options("TLS_AES_128_GCM_SHA256"))
            .unwrap()
            .get(&engines_path())
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::Transport { .. }), "{err}");

        let response = transport(&server.url, &options("TLS_AES_256_GCM_SHA384"))
            .unwrap()
            .get(&engines_path())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }
}

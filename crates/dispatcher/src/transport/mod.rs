//! Transport implementations and the TLS configurator

pub mod http;
pub mod mock;
pub mod tls;

pub use http::HttpTransport;
pub use mock::{shaped_body, MockTransport, RecordedRequest};
pub use tls::{build, TlsProtocol, TransportConfig, Truststore, TruststoreType, Verification};

//! TLS support for HTTPS connections
//!
//! # Architecture
//!
//! 1. `TlsConfig` holds trust settings and an optional client identity
//!    (certificate + private key). It is the client-certificate provider
//!    handed to `RequestClient`.
//! 2. `TlsConnector` is built from a config once per connection handle and
//!    acts as the socket factory: it wraps a connected `TcpStream`.
//! 3. `TlsSession` implements `SessionOps` over the encrypted stream, so the
//!    connection handle does not change between `http` and `https`.
//!
//! # Examples
//!
//! ```no_run
//! use connectivity::http::tls::{TlsConfig, TlsVersion};
//! use connectivity::RequestClient;
//!
//! let tls = TlsConfig::client()
//!     .cert_file("device.pem")
//!     .unwrap()
//!     .ca_file("ca.pem")
//!     .unwrap()
//!     .version_range(TlsVersion::Tls12, TlsVersion::Tls13)
//!     .build()
//!     .unwrap();
//!
//! let mut client = RequestClient::client_certificate(tls);
//! client.connect("https://iot.example.com/api/v1/measures").unwrap();
//! let reply = client.get_string().unwrap();
//! ```

pub mod cert;
pub mod config;
pub mod session;

pub use cert::CertInfo;
pub use config::{ClientConfigBuilder, TlsConfig, TlsConnector, TlsError, TlsVersion};
pub use session::TlsSession;

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;

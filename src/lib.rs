//! connectivity - blocking JSON-over-HTTP(S) client
//!
//! This crate provides a small request client for talking JSON to a single
//! remote endpoint, authenticated with HTTP basic auth or a TLS client
//! certificate, on top of a minimal HTTP/1.1 stack with OpenSSL transport.
//!
//! ```no_run
//! use connectivity::RequestClient;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Status {
//!     healthy: bool,
//! }
//!
//! let mut client = RequestClient::basic_auth("device", "secret");
//! client.connect("https://api.example.com/status")?;
//! let status: Status = client.get_json()?;
//! assert!(status.healthy);
//! # Ok::<(), connectivity::Error>(())
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod json;

pub use client::{JsonClient, RequestClient, CONTENT_TYPE_JSON};
pub use config::{BasicAuth, BodyDecoding, ClientBuilder, DEFAULT_USER_AGENT};
pub use error::{Error, Result, UrlError};
pub use http::tls::TlsConfig;
pub use json::{JsonCodec, JsonError, SerdeJson};

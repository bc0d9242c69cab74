//! HTTP/1.1 client plumbing
//!
//! This module provides the pieces `RequestClient` is built from: message
//! types, a response head parser, chunked body decoding, the transport
//! abstraction and the connection handle.
//!
//! # Architecture
//!
//! The transport layer uses a session operations abstraction so that the
//! connection handle does not care whether it talks plain TCP or TLS:
//!
//! - `SessionOps` trait defines operations (read, write, flush, close)
//! - `PlainSession` implements it over a `TcpStream`
//! - `tls::TlsSession` implements it over an OpenSSL stream
//!
//! # Examples
//!
//! ```no_run
//! use connectivity::http::{Connection, Method};
//! use url::Url;
//!
//! let url = Url::parse("http://127.0.0.1:8080/status").unwrap();
//! let mut connection = Connection::new(url, None).unwrap();
//! connection.set_request_property("Content-Type", "application/json");
//!
//! connection.send(Method::Get, b"").unwrap();
//! let response = connection.response().unwrap();
//! assert_eq!(response.status().code(), 200);
//! ```

pub mod chunked;
pub mod connection;
pub mod headers;
pub mod message;
pub mod parser;
pub mod session;
pub mod tls;

pub use connection::{BodyStream, Connection, ResponseStreams};
pub use headers::Headers;
pub use message::{HttpRequest, Method, Status, Version};
pub use parser::{ResponseHead, ResponseParser};
pub use session::{close_quietly, PlainSession, SessionOps};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] tls::TlsError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid HTTP version: {0}")]
    InvalidVersion(String),

    #[error("Invalid HTTP status: {0}")]
    InvalidStatus(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("The input stream was null")]
    NullStream,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// CRLF line ending
pub const CRLF: &str = "\r\n";

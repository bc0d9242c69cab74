//! Error type for `RequestClient` operations

use crate::http;
use crate::http::tls::TlsError;
use crate::json::JsonError;
use std::io;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a destination was rejected
#[derive(Debug, thiserror::Error)]
pub enum UrlError {
    #[error(transparent)]
    Parse(#[from] url::ParseError),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Client errors
///
/// Every failure leaves the client disconnected. Variants separate the
/// configuration, transport and decode failures callers usually want to tell
/// apart; `From<Error> for io::Error` folds them into a single I/O kind.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither basic-auth credentials nor a usable client certificate
    #[error("No authorization details provided")]
    NoAuthorization,

    /// A request was issued before any destination was recorded
    #[error("No destination specified")]
    NoDestination,

    #[error("Invalid HTTPS connection URL specified: {url}")]
    InvalidUrl {
        url: String,
        #[source]
        source: UrlError,
    },

    /// The connection handle could not be set up
    #[error("Unable to open a HTTP connection")]
    Open(#[source] TlsError),

    #[error("Transport error: {0}")]
    Transport(#[from] http::Error),

    #[error("Unable to read from the input stream")]
    Read(#[source] io::Error),

    #[error("Unexpected JSON format returned")]
    UnexpectedJson(#[source] JsonError),

    #[error("Unable to encode request payload")]
    Encode(#[source] JsonError),
}

impl Error {
    /// Missing or unusable credentials, destination or URL
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::NoAuthorization | Error::NoDestination | Error::InvalidUrl { .. } | Error::Open(_)
        )
    }

    /// Socket, TLS or stream failure
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Read(_))
    }

    /// The reply was not the JSON that was asked for
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::UnexpectedJson(_))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match &err {
            e if e.is_configuration() => io::ErrorKind::InvalidInput,
            Error::UnexpectedJson(_) | Error::Encode(_) => io::ErrorKind::InvalidData,
            Error::Read(e) | Error::Transport(http::Error::Io(e)) => e.kind(),
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

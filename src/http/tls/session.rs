//! TLS session operations
//!
//! This module implements the SessionOps trait for TLS connections,
//! enabling transparent switching between plain TCP and TLS I/O.

use super::cert::CertInfo;
use crate::http::session::SessionOps;
use crate::http::{Error, Result as HttpResult};
use openssl::ssl::SslStream;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};

/// TLS session operations
///
/// Wraps an OpenSSL `SslStream` after a completed handshake.
pub struct TlsSession {
    stream: SslStream<TcpStream>,
    failed: bool,
}

impl TlsSession {
    pub(crate) fn new(stream: SslStream<TcpStream>) -> Self {
        TlsSession {
            stream,
            failed: false,
        }
    }

    /// Negotiated protocol version, e.g. "TLSv1.3"
    pub fn version(&self) -> &'static str {
        self.stream.ssl().version_str()
    }

    /// Server certificate presented during the handshake
    pub fn peer_certificate(&self) -> Option<CertInfo> {
        self.stream
            .ssl()
            .peer_certificate()
            .map(|cert| CertInfo::from_x509(&cert))
    }

    fn record<T>(&mut self, result: std::io::Result<T>) -> HttpResult<T> {
        result.map_err(|e| {
            self.failed = true;
            Error::Io(e)
        })
    }
}

impl SessionOps for TlsSession {
    fn read(&mut self, buf: &mut [u8]) -> HttpResult<usize> {
        let result = self.stream.read(buf);
        self.record(result)
    }

    fn write(&mut self, buf: &[u8]) -> HttpResult<usize> {
        let result = self.stream.write(buf);
        self.record(result)
    }

    fn flush(&mut self) -> HttpResult<()> {
        let result = self.stream.flush();
        self.record(result)
    }

    fn close(&mut self) -> HttpResult<()> {
        // close_notify only makes sense on a healthy stream
        if !self.failed {
            let _ = self.stream.shutdown();
        }

        self.stream
            .get_mut()
            .shutdown(Shutdown::Both)
            .map_err(Error::from)
    }
}

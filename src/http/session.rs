//! Session operations abstraction
//!
//! This module provides the session operations pattern that allows the
//! connection handle to switch transparently between plain TCP and TLS.

use super::{Error, Result};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};

/// Session operations trait
///
/// This trait defines the operations that can be performed on a session,
/// abstracting over plain TCP and TLS connections. All operations block.
pub trait SessionOps {
    /// Read data from the session
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write data to the session
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Flush buffered output
    fn flush(&mut self) -> Result<()>;

    /// Close the session
    fn close(&mut self) -> Result<()>;

    /// Write the whole buffer
    fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf)?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            buf = &buf[n..];
        }
        Ok(())
    }
}

/// Close a session, logging and discarding any error
///
/// Close-time failures must never mask the outcome of the operation that
/// used the session.
pub fn close_quietly<S: SessionOps + ?Sized>(session: &mut S) {
    if let Err(e) = session.close() {
        tracing::debug!(error = %e, "ignoring error while closing session");
    }
}

/// Plain TCP session operations
pub struct PlainSession {
    stream: TcpStream,
}

impl PlainSession {
    /// Create a new plain session from a TCP stream
    pub fn new(stream: TcpStream) -> Self {
        PlainSession { stream }
    }
}

impl SessionOps for PlainSession {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(Error::from)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(Error::from)
    }

    fn flush(&mut self) -> Result<()> {
        self.stream.flush().map_err(Error::from)
    }

    fn close(&mut self) -> Result<()> {
        self.stream.shutdown(Shutdown::Both).map_err(Error::from)
    }
}

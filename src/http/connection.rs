//! Connection handle
//!
//! A `Connection` represents one request/response cycle against one URL. It
//! carries the request properties (headers) set by the caller, opens its
//! session lazily, writes a single request and exposes the response as a head
//! plus a body stream. Dropping or disconnecting it closes the session.

use super::chunked::ChunkedDecoder;
use super::parser::{ResponseHead, ResponseParser};
use super::session::{close_quietly, PlainSession, SessionOps};
use super::tls::{TlsConfig, TlsConnector, TlsError};
use super::{Error, Headers, HttpRequest, Method, Result, Status, DEFAULT_HTTP_PORT};
use std::io::{self, Read};
use std::net::TcpStream;
use tracing::debug;
use url::{Host, Url};

const READ_CHUNK: usize = 4096;

type BoxedSession = Box<dyn SessionOps + Send>;

/// A single outbound HTTP(S) connection
pub struct Connection {
    url: Url,
    tls: Option<TlsConnector>,
    properties: Headers,
    session: Option<BoxedSession>,
}

impl Connection {
    /// Create a connection handle for `url`
    ///
    /// For `https` URLs the TLS connector is built here from `tls`, or from
    /// the default configuration when none is given. No socket is opened yet.
    pub fn new(url: Url, tls: Option<&TlsConfig>) -> std::result::Result<Self, TlsError> {
        let tls = if url.scheme() == "https" {
            Some(tls.cloned().unwrap_or_default().connector()?)
        } else {
            None
        };

        Ok(Connection {
            url,
            tls,
            properties: Headers::new(),
            session: None,
        })
    }

    /// The URL this connection targets
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the connection uses TLS
    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }

    /// Whether a client certificate will be presented during the handshake
    pub fn client_identity_attached(&self) -> bool {
        self.tls
            .as_ref()
            .is_some_and(TlsConnector::identity_attached)
    }

    /// Set a request property, replacing any previous value
    pub fn set_request_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.set(name, value);
    }

    /// All request properties
    pub fn request_properties(&self) -> &Headers {
        &self.properties
    }

    /// Whether the session is open
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Open the session if it is not open yet
    pub fn open(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let host = self.socket_host()?;
        let port = self.url.port_or_known_default().unwrap_or(DEFAULT_HTTP_PORT);

        debug!(%host, port, secure = self.is_secure(), "opening session");
        let stream = TcpStream::connect((host.as_str(), port))?;

        let session: BoxedSession = match &self.tls {
            Some(connector) => {
                let session = connector.connect(&host, stream)?;
                let peer = session.peer_certificate();
                debug!(
                    version = session.version(),
                    peer = peer.as_ref().map_or("<none>", |cert| cert.subject.as_str()),
                    issuer = peer.as_ref().map_or("<none>", |cert| cert.issuer.as_str()),
                    "TLS session established"
                );
                Box::new(session)
            }
            None => Box::new(PlainSession::new(stream)),
        };

        self.session = Some(session);
        Ok(())
    }

    /// Write one request with the current request properties
    ///
    /// Opens the session first if needed. `Content-Length` is sent for POST
    /// and for any non-empty body.
    pub fn send(&mut self, method: Method, body: &[u8]) -> Result<()> {
        self.open()?;

        let mut builder = HttpRequest::builder()
            .method(method)
            .uri(self.request_target())
            .header("Host", self.host_header())
            .headers(&self.properties);
        if !self.properties.contains("Connection") {
            builder = builder.header("Connection", "close");
        }
        if method == Method::Post || !body.is_empty() {
            builder = builder.header("Content-Length", body.len().to_string());
        }
        let request = builder.body(body.to_vec()).build();

        debug!(method = %method, target = request.uri(), "sending request");

        let session = self.session.as_deref_mut().ok_or(Error::NullStream)?;
        session.write_all(&request.to_wire())?;
        session.flush()
    }

    /// Read the response head and prepare its body stream
    ///
    /// Interim (1xx) responses are skipped.
    pub fn response(&mut self) -> Result<ResponseStreams<'_>> {
        let session = self.session.as_deref_mut().ok_or(Error::NullStream)?;
        let mut parser = ResponseParser::new();
        let mut temp = [0u8; READ_CHUNK];
        let mut input: &[u8] = &[];

        let head = loop {
            match parser.parse(input)? {
                Some(head) if head.status().is_informational() => {
                    debug!(code = head.status().code(), "skipping interim response");
                    parser.reset();
                    input = &[];
                }
                Some(head) => break head,
                None => {
                    let n = session.read(&mut temp)?;
                    if n == 0 {
                        return Err(Error::ConnectionClosed);
                    }
                    input = &temp[..n];
                }
            }
        };

        let framing = Framing::for_head(&head)?;
        debug!(code = head.status().code(), ?framing, "response head received");

        Ok(ResponseStreams {
            head,
            body: BodyStream {
                session,
                buffered: parser.take_remaining(),
                pos: 0,
                framing,
            },
        })
    }

    /// Close the session, discarding close errors
    pub fn disconnect(&mut self) {
        if let Some(mut session) = self.session.take() {
            debug!(url = %self.url, "closing session");
            close_quietly(session.as_mut());
        }
    }

    fn socket_host(&self) -> Result<String> {
        match self.url.host() {
            Some(Host::Domain(domain)) => Ok(domain.to_string()),
            Some(Host::Ipv4(ip)) => Ok(ip.to_string()),
            Some(Host::Ipv6(ip)) => Ok(ip.to_string()),
            None => Err(Error::Protocol(format!("URL has no host: {}", self.url))),
        }
    }

    fn host_header(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    fn request_target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// How the end of a response body is found
#[derive(Debug)]
enum Framing {
    /// The message cannot carry a body
    None,
    Length { remaining: usize },
    Chunked { decoder: ChunkedDecoder },
    /// Delimited by the server closing the connection
    Eof,
}

impl Framing {
    fn for_head(head: &ResponseHead) -> Result<Self> {
        if !head.status().allows_body() {
            return Ok(Framing::None);
        }
        if head.is_chunked() {
            return Ok(Framing::Chunked {
                decoder: ChunkedDecoder::new(),
            });
        }
        Ok(match head.content_length()? {
            Some(remaining) => Framing::Length { remaining },
            None => Framing::Eof,
        })
    }
}

/// A response head together with its (not yet read) body
///
/// The success and error streams are the same bytes on the wire; which one
/// is available depends on the status, mirroring how the body of an error
/// response is read separately from a successful one.
pub struct ResponseStreams<'a> {
    head: ResponseHead,
    body: BodyStream<'a>,
}

impl<'a> ResponseStreams<'a> {
    /// Get the status
    pub fn status(&self) -> Status {
        self.head.status()
    }

    /// Get the reason phrase from the status line
    pub fn reason(&self) -> &str {
        self.head.reason()
    }

    /// Get the response headers
    pub fn headers(&self) -> &Headers {
        self.head.headers()
    }

    /// The body stream for a successful exchange
    ///
    /// `None` when the status does not allow a body (204, 304).
    pub fn input_stream(self) -> Option<BodyStream<'a>> {
        match self.body.framing {
            Framing::None => None,
            _ => Some(self.body),
        }
    }

    /// The body stream for a failed exchange
    ///
    /// `None` when the status does not allow a body or the body is declared
    /// empty.
    pub fn error_stream(self) -> Option<BodyStream<'a>> {
        match self.body.framing {
            Framing::None | Framing::Length { remaining: 0 } => None,
            _ => Some(self.body),
        }
    }
}

/// Reader over a response body
///
/// Yields the decoded body bytes (chunked framing removed) and reports EOF at
/// the end of the body, not at the end of the connection.
pub struct BodyStream<'a> {
    session: &'a mut (dyn SessionOps + Send),
    buffered: Vec<u8>,
    pos: usize,
    framing: Framing,
}

impl BodyStream<'_> {
    fn buffered(&self) -> &[u8] {
        &self.buffered[self.pos..]
    }

    /// Read into `buf`, serving buffered bytes before touching the session
    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.buffered();
        if !available.is_empty() {
            let n = available.len().min(buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            self.pos += n;
            return Ok(n);
        }
        self.session.read(buf).map_err(into_io)
    }

    /// Pull more raw bytes into the buffer for the chunked decoder
    fn fill(&mut self) -> io::Result<()> {
        self.buffered.drain(..self.pos);
        self.pos = 0;

        let mut temp = [0u8; READ_CHUNK];
        let n = self.session.read(&mut temp).map_err(into_io)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed inside chunked body",
            ));
        }
        self.buffered.extend_from_slice(&temp[..n]);
        Ok(())
    }
}

impl Read for BodyStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        match self.framing {
            Framing::None => Ok(0),

            Framing::Length { remaining: 0 } => Ok(0),

            Framing::Length { remaining } => {
                let limit = remaining.min(buf.len());
                let n = self.read_raw(&mut buf[..limit])?;
                if n == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("connection closed with {} body bytes missing", remaining),
                    ));
                }
                self.framing = Framing::Length {
                    remaining: remaining - n,
                };
                Ok(n)
            }

            Framing::Eof => self.read_raw(buf),

            Framing::Chunked { .. } => loop {
                let Framing::Chunked { decoder } = &mut self.framing else {
                    unreachable!("framing changed while decoding");
                };
                if decoder.is_complete() {
                    return Ok(0);
                }

                let input = &self.buffered[self.pos..];
                if !input.is_empty() {
                    let (consumed, decoded, complete) =
                        decoder.decode(input, buf).map_err(into_io)?;
                    self.pos += consumed;
                    if decoded > 0 || complete {
                        return Ok(decoded);
                    }
                    if consumed > 0 {
                        continue;
                    }
                }

                self.fill()?;
            },
        }
    }
}

fn into_io(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

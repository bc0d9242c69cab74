//! HTTP response head parsing
//!
//! The parser consumes bytes until the status line and headers are complete.
//! Body bytes that arrived in the same reads stay buffered and are handed to
//! the body stream through `take_remaining()`.

use super::{Error, Headers, Result, Status, Version};

/// Find the next CRLF in a buffer
pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parse HTTP response status line
///
/// Format: VERSION STATUS REASON\r\n
/// Example: HTTP/1.1 200 OK\r\n
pub fn parse_status_line(line: &str) -> Result<(Version, Status, String)> {
    let parts: Vec<&str> = line.splitn(3, ' ').collect();

    if parts.len() < 2 {
        return Err(Error::Parse(format!(
            "Invalid status line: expected at least 2 parts, got {}",
            parts.len()
        )));
    }

    let version = Version::from_str(parts[0])?;
    let status_code = parts[1]
        .parse::<u16>()
        .map_err(|_| Error::Parse(format!("Invalid status code: {}", parts[1])))?;
    let status = Status::new(status_code)?;
    let reason = match parts.get(2).map(|r| r.trim()) {
        Some(reason) if !reason.is_empty() => reason.to_string(),
        _ => status.reason_phrase().to_string(),
    };

    Ok((version, status, reason))
}

/// Status line and headers of a response
#[derive(Debug, Clone)]
pub struct ResponseHead {
    version: Version,
    status: Status,
    reason: String,
    headers: Headers,
}

impl ResponseHead {
    /// Get the HTTP version
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get the status code
    pub fn status(&self) -> Status {
        self.status
    }

    /// Get the reason phrase from the status line
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Declared `Content-Length`, if any
    pub fn content_length(&self) -> Result<Option<usize>> {
        self.headers
            .get("Content-Length")
            .map(|cl| {
                cl.parse::<usize>()
                    .map_err(|_| Error::Parse(format!("Invalid Content-Length: {}", cl)))
            })
            .transpose()
    }

    /// Whether the body uses chunked transfer encoding
    pub fn is_chunked(&self) -> bool {
        self.headers
            .get_all("Transfer-Encoding")
            .iter()
            .flat_map(|v| v.split(','))
            .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    StatusLine,
    Headers,
    Complete,
}

/// HTTP response head parser
pub struct ResponseParser {
    state: ParserState,
    buffer: Vec<u8>,
    version: Option<Version>,
    status: Option<Status>,
    reason: Option<String>,
    headers: Headers,
}

impl ResponseParser {
    /// Create a new response parser
    pub fn new() -> Self {
        ResponseParser {
            state: ParserState::StatusLine,
            buffer: Vec::new(),
            version: None,
            status: None,
            reason: None,
            headers: Headers::new(),
        }
    }

    /// Feed data to the parser
    ///
    /// Returns Ok(Some(head)) once the status line and headers are complete,
    /// Ok(None) if more data is needed, or Err on parse error.
    pub fn parse(&mut self, data: &[u8]) -> Result<Option<ResponseHead>> {
        self.buffer.extend_from_slice(data);

        match self.state {
            ParserState::StatusLine => self.parse_status_line(),
            ParserState::Headers => self.parse_headers(),
            ParserState::Complete => Ok(None),
        }
    }

    /// Take the bytes buffered past the end of the head
    pub fn take_remaining(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    fn parse_status_line(&mut self) -> Result<Option<ResponseHead>> {
        let Some(crlf_pos) = find_crlf(&self.buffer) else {
            return Ok(None);
        };

        let line = String::from_utf8_lossy(&self.buffer[..crlf_pos]).to_string();
        self.buffer.drain(..crlf_pos + 2);

        let (version, status, reason) = parse_status_line(&line)?;
        self.version = Some(version);
        self.status = Some(status);
        self.reason = Some(reason);

        self.state = ParserState::Headers;
        self.parse_headers()
    }

    fn parse_headers(&mut self) -> Result<Option<ResponseHead>> {
        while let Some(crlf_pos) = find_crlf(&self.buffer) {
            if crlf_pos == 0 {
                // Empty line marks end of headers
                self.buffer.drain(..2);
                self.state = ParserState::Complete;
                return self.finish().map(Some);
            }

            let line = String::from_utf8_lossy(&self.buffer[..crlf_pos]).to_string();
            self.buffer.drain(..crlf_pos + 2);

            let (name, value) = Headers::parse_header_line(&line)?;
            self.headers.insert(name, value);
        }

        Ok(None)
    }

    fn finish(&mut self) -> Result<ResponseHead> {
        match (self.version, self.status, self.reason.take()) {
            (Some(version), Some(status), Some(reason)) => Ok(ResponseHead {
                version,
                status,
                reason,
                headers: std::mem::take(&mut self.headers),
            }),
            _ => Err(Error::Protocol("response head without status line".to_string())),
        }
    }

    /// Reset the parser for the next head, keeping buffered bytes
    ///
    /// Used to skip interim (1xx) responses.
    pub fn reset(&mut self) {
        self.state = ParserState::StatusLine;
        self.version = None;
        self.status = None;
        self.reason = None;
        self.headers.clear();
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

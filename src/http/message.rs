//! HTTP message types
//!
//! Outbound requests are built with `HttpRequest::builder()` and serialized
//! with `to_wire()`. Responses are read as a `ResponseHead` (see the parser
//! module) followed by a body stream.

use super::{Error, Headers, Result, CRLF};
use std::fmt;

/// HTTP methods issued by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// Convert method to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    /// Parse version from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "HTTP/1.0" => Ok(Version::Http10),
            "HTTP/1.1" => Ok(Version::Http11),
            _ => Err(Error::InvalidVersion(s.to_string())),
        }
    }

    /// Convert version to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

/// HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
}

impl Status {
    /// Create a new status code
    pub fn new(code: u16) -> Result<Self> {
        if (100..600).contains(&code) {
            Ok(Status { code })
        } else {
            Err(Error::InvalidStatus(format!("Invalid status code: {}", code)))
        }
    }

    /// Get the status code
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Get the canonical reason phrase for this status code
    ///
    /// Used when a server sends a status line without a reason phrase.
    pub fn reason_phrase(&self) -> &'static str {
        match self.code {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            203 => "Non-Authoritative Information",
            204 => "No Content",
            205 => "Reset Content",
            206 => "Partial Content",
            300 => "Multiple Choices",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            409 => "Conflict",
            410 => "Gone",
            413 => "Payload Too Large",
            415 => "Unsupported Media Type",
            422 => "Unprocessable Entity",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "Unknown",
        }
    }

    /// Check if this is an informational status (1xx)
    pub fn is_informational(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Whether a response with this status may carry a message body
    ///
    /// 1xx, 204 and 304 responses never do, regardless of their headers.
    pub fn allows_body(&self) -> bool {
        !(self.is_informational() || self.code == 204 || self.code == 304)
    }
}

/// HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: Method,
    uri: String,
    headers: Headers,
    body: Vec<u8>,
}

impl HttpRequest {
    /// Create a builder for constructing requests
    pub fn builder() -> HttpRequestBuilder {
        HttpRequestBuilder::default()
    }

    /// Get the request target
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Convert the request to wire format
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256 + self.body.len());

        // Request line
        buf.extend_from_slice(self.method.as_str().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.uri.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(Version::Http11.as_str().as_bytes());
        buf.extend_from_slice(CRLF.as_bytes());

        for (name, value) in self.headers.iter() {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(CRLF.as_bytes());
        }

        buf.extend_from_slice(CRLF.as_bytes());
        buf.extend_from_slice(&self.body);

        buf
    }
}

/// Builder for HTTP requests
#[derive(Debug, Default)]
pub struct HttpRequestBuilder {
    method: Option<Method>,
    uri: Option<String>,
    headers: Headers,
    body: Vec<u8>,
}

impl HttpRequestBuilder {
    /// Set the HTTP method
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the request target
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add every header from a collection
    pub fn headers(mut self, headers: &Headers) -> Self {
        for (name, value) in headers.iter() {
            self.headers.insert(name, value);
        }
        self
    }

    /// Set the body
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Build the request
    pub fn build(self) -> HttpRequest {
        HttpRequest {
            method: self.method.unwrap_or(Method::Get),
            uri: self.uri.unwrap_or_else(|| "/".to_string()),
            headers: self.headers,
            body: self.body,
        }
    }
}

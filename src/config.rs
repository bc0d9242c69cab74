//! Client configuration
//!
//! Credentials, body decoding and codec choice for a `RequestClient`,
//! assembled with `ClientBuilder`.

use crate::client::RequestClient;
use crate::http::tls::TlsConfig;
use crate::json::{JsonCodec, SerdeJson};
use std::fmt;

/// Default `User-Agent` request property
pub const DEFAULT_USER_AGENT: &str = concat!("connectivity/", env!("CARGO_PKG_VERSION"));

/// HTTP basic-auth credentials
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        BasicAuth {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Value of the `Authorization` header: `Basic base64(user:password)`
    pub fn header_value(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password);
        format!("Basic {}", openssl::base64::encode_block(credentials.as_bytes()))
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How response body bytes become text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyDecoding {
    /// Each byte becomes the character with the same code point (ISO-8859-1).
    ///
    /// Multi-byte UTF-8 sequences come out as one character per byte.
    #[default]
    Latin1,
    /// Decode as UTF-8, replacing invalid sequences with U+FFFD
    Utf8Lossy,
}

/// Builder for `RequestClient`
pub struct ClientBuilder<C = SerdeJson> {
    pub(crate) basic: Option<BasicAuth>,
    pub(crate) tls: Option<TlsConfig>,
    pub(crate) codec: C,
    pub(crate) decoding: BodyDecoding,
    pub(crate) user_agent: String,
}

impl ClientBuilder<SerdeJson> {
    pub fn new() -> Self {
        ClientBuilder {
            basic: None,
            tls: None,
            codec: SerdeJson::new(),
            decoding: BodyDecoding::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for ClientBuilder<SerdeJson> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: JsonCodec> ClientBuilder<C> {
    /// Authenticate with HTTP basic auth
    ///
    /// Takes precedence over a client certificate in the TLS configuration.
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic = Some(BasicAuth::new(username, password));
        self
    }

    /// TLS settings for `https` destinations
    ///
    /// A config carrying a client identity enables client-certificate
    /// authentication when no basic-auth credentials are set.
    pub fn tls(mut self, config: TlsConfig) -> Self {
        self.tls = Some(config);
        self
    }

    /// Replace the JSON codec
    pub fn codec<D: JsonCodec>(self, codec: D) -> ClientBuilder<D> {
        ClientBuilder {
            basic: self.basic,
            tls: self.tls,
            codec,
            decoding: self.decoding,
            user_agent: self.user_agent,
        }
    }

    pub fn body_decoding(mut self, decoding: BodyDecoding) -> Self {
        self.decoding = decoding;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client
    ///
    /// Credentials are checked when connecting, not here.
    pub fn build(self) -> RequestClient<C> {
        RequestClient::from_builder(self)
    }
}

//! JSON request client
//!
//! `RequestClient` owns at most one `Connection` at a time. `connect` records
//! the destination and prepares an authenticated handle; every GET or POST
//! uses that handle once and then disconnects, reconnecting lazily to the
//! recorded destination on the next call.
//!
//! State machine:
//!
//! ```text
//! disconnected --connect()--> connected --get_*/post_*--> (disconnect) --> disconnected
//! ```

use crate::config::{BasicAuth, BodyDecoding, ClientBuilder};
use crate::error::{Error, Result, UrlError};
use crate::http::tls::TlsConfig;
use crate::http::{self, Connection, Method};
use crate::json::{JsonCodec, SerdeJson};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufReader, Read};
use tracing::info;
use url::Url;

/// `Content-Type` set on every request
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Shared surface of JSON speaking clients
pub trait JsonClient {
    /// Text encoding of request bodies
    const ENCODING: &'static str = "UTF-8";

    type Codec: JsonCodec;

    /// The codec used for payloads and replies
    fn codec(&self) -> &Self::Codec;
}

/// Status code and body text of one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
struct Response {
    code: u16,
    body: String,
}

impl Response {
    fn code(&self) -> u16 {
        self.code
    }

    fn body(&self) -> &str {
        &self.body
    }

    fn into_body(self) -> String {
        self.body
    }
}

/// HTTP(S) client exchanging JSON with one destination at a time
///
/// Authenticates with basic auth or a TLS client certificate. Not meant to
/// be shared between threads; every operation blocks.
pub struct RequestClient<C = SerdeJson> {
    connection: Option<Connection>,
    destination: Option<String>,
    basic: Option<BasicAuth>,
    tls: Option<TlsConfig>,
    codec: C,
    decoding: BodyDecoding,
    user_agent: String,
}

impl RequestClient<SerdeJson> {
    /// Start building a client
    pub fn builder() -> ClientBuilder<SerdeJson> {
        ClientBuilder::new()
    }

    /// Client authenticating with HTTP basic auth
    pub fn basic_auth(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::builder().basic_auth(username, password).build()
    }

    /// Client authenticating with the client certificate in `tls`
    pub fn client_certificate(tls: TlsConfig) -> Self {
        Self::builder().tls(tls).build()
    }
}

impl<C: JsonCodec> RequestClient<C> {
    pub(crate) fn from_builder(builder: ClientBuilder<C>) -> Self {
        RequestClient {
            connection: None,
            destination: None,
            basic: builder.basic,
            tls: builder.tls,
            codec: builder.codec,
            decoding: builder.decoding,
            user_agent: builder.user_agent,
        }
    }

    /// Destination recorded by the last `connect`
    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// The open connection handle, if any
    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Prepare an authenticated connection to `destination`
    ///
    /// Any open connection is closed first. The destination is recorded even
    /// when this fails, so a later request retries it.
    pub fn connect(&mut self, destination: &str) -> Result<()> {
        self.destination = Some(destination.to_string());
        self.disconnect();

        info!("Connect to {}", destination);

        let url = parse_destination(destination)?;
        let secure = url.scheme() == "https";

        let (authorization, tls) = if let Some(basic) = &self.basic {
            (
                Some(basic.header_value()),
                self.tls.as_ref().map(TlsConfig::without_identity),
            )
        } else if let Some(tls) = self.tls.as_ref().filter(|t| t.has_identity() && secure) {
            (None, Some(tls.clone()))
        } else {
            return Err(Error::NoAuthorization);
        };

        let mut connection = Connection::new(url, tls.as_ref()).map_err(Error::Open)?;
        if let Some(authorization) = authorization {
            connection.set_request_property("Authorization", authorization);
        }
        connection.set_request_property("User-Agent", self.user_agent.as_str());

        self.connection = Some(connection);
        Ok(())
    }

    /// Close the connection if one is open
    pub fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect();
        }
    }

    /// GET the destination and return the body text
    pub fn get_string(&mut self) -> Result<String> {
        self.exchange(Method::Get, None)
    }

    /// GET the destination and decode the body
    pub fn get_json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let body = self.get_string()?;
        self.decode(&body)
    }

    /// POST a pre-serialized body and return the reply text
    pub fn post_string(&mut self, request: &str) -> Result<String> {
        self.exchange(Method::Post, Some(request))
    }

    /// POST `payload` as JSON and decode the reply
    pub fn post_json<T, R>(&mut self, payload: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self.encode(payload)?;
        let response = self.post_string(&request)?;
        self.decode(&response)
    }

    /// POST `payload` as JSON and discard the reply
    pub fn post<T: Serialize + ?Sized>(&mut self, payload: &T) -> Result<()> {
        let request = self.encode(payload)?;
        self.post_string(&request).map(drop)
    }

    /// POST `payload` and require a reply of the same shape
    ///
    /// The decoded reply is discarded; a reply that is not JSON of that shape
    /// is still an error.
    pub fn send<T: Serialize + DeserializeOwned>(&mut self, payload: &T) -> Result<()> {
        self.post_json::<T, T>(payload).map(drop)
    }

    fn encode<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String> {
        self.codec.serialize(payload).map_err(Error::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, body: &str) -> Result<T> {
        self.codec.deserialize(body).map_err(Error::UnexpectedJson)
    }

    /// One request/response cycle, always ending disconnected
    fn exchange(&mut self, method: Method, request: Option<&str>) -> Result<String> {
        if self.connection.is_none() {
            let destination = self.destination.clone().ok_or(Error::NoDestination)?;
            self.connect(&destination)?;
        }

        let mut guard = DisconnectGuard(self);
        let result = guard.0.perform(method, request);
        drop(guard);
        result
    }

    fn perform(&mut self, method: Method, request: Option<&str>) -> Result<String> {
        let decoding = self.decoding;
        let connection = self
            .connection
            .as_mut()
            .ok_or(Error::Transport(http::Error::NullStream))?;

        connection.set_request_property("Content-Type", CONTENT_TYPE_JSON);

        if let Some(request) = request {
            info!("Request {}", request);
        }
        let bytes = request.map(str::as_bytes).unwrap_or_default();
        connection.send(method, bytes)?;

        let response = read_response(connection, decoding)?;
        info!("Response [{}] {}", response.code(), response.body());

        Ok(response.into_body())
    }
}

impl<C: JsonCodec> JsonClient for RequestClient<C> {
    type Codec = C;

    fn codec(&self) -> &C {
        &self.codec
    }
}

impl<C> Drop for RequestClient<C> {
    fn drop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.disconnect();
        }
    }
}

/// Disconnects the client when dropped
struct DisconnectGuard<'a, C: JsonCodec>(&'a mut RequestClient<C>);

impl<C: JsonCodec> Drop for DisconnectGuard<'_, C> {
    fn drop(&mut self) {
        self.0.disconnect();
    }
}

/// Parse and normalize a destination URL
///
/// Only `http` and `https` are accepted; the fragment is dropped.
fn parse_destination(destination: &str) -> Result<Url> {
    let invalid = |source: UrlError| Error::InvalidUrl {
        url: destination.to_string(),
        source,
    };

    let mut url = Url::parse(destination).map_err(|e| invalid(e.into()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(UrlError::UnsupportedScheme(url.scheme().to_string())));
    }
    url.set_fragment(None);

    Ok(url)
}

/// Read status and body, falling back to the reason phrase without a body
///
/// Codes in `200..301` read the success stream, everything else the error
/// stream.
fn read_response(connection: &mut Connection, decoding: BodyDecoding) -> Result<Response> {
    let response = connection.response()?;
    let code = response.status().code();
    let reason = response.reason().to_string();

    let stream = if !(200..301).contains(&code) {
        response.error_stream()
    } else {
        response.input_stream()
    };

    let body = match stream {
        Some(stream) => read_string(stream, decoding)?,
        None => reason,
    };

    Ok(Response { code, body })
}

fn read_string<R: Read>(stream: R, decoding: BodyDecoding) -> Result<String> {
    let mut reader = BufReader::new(stream);

    match decoding {
        BodyDecoding::Latin1 => {
            let mut body = String::new();
            for byte in reader.bytes() {
                body.push(char::from(byte.map_err(Error::Read)?));
            }
            Ok(body)
        }
        BodyDecoding::Utf8Lossy => {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes).map_err(Error::Read)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    #[test]
    fn test_connect_with_basic_auth() {
        let mut client = RequestClient::basic_auth("user", "pass");
        client.connect("http://127.0.0.1:9/api").unwrap();

        let connection = client.connection().unwrap();
        assert_eq!(
            connection.request_properties().get_all("Authorization"),
            vec!["Basic dXNlcjpwYXNz"]
        );
        assert!(!connection.client_identity_attached());
        assert!(!connection.is_open());
        assert_eq!(client.destination(), Some("http://127.0.0.1:9/api"));
    }

    #[test]
    fn test_connect_without_credentials() {
        let mut client = RequestClient::builder().build();
        let err = client.connect("https://127.0.0.1:9/").unwrap_err();

        assert!(matches!(err, Error::NoAuthorization));
        assert!(!client.is_connected());
        // Recorded anyway
        assert_eq!(client.destination(), Some("https://127.0.0.1:9/"));
    }

    #[test]
    fn test_identity_less_tls_config_is_not_a_credential() {
        let mut client = RequestClient::client_certificate(TlsConfig::default());
        let err = client.connect("https://127.0.0.1:9/").unwrap_err();
        assert!(matches!(err, Error::NoAuthorization));
    }

    #[test]
    fn test_invalid_destinations() {
        let mut client = RequestClient::basic_auth("user", "pass");

        let err = client.connect("not a url").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidUrl {
                source: UrlError::Parse(_),
                ..
            }
        ));

        let err = client.connect("ftp://files.example.com/report").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidUrl {
                source: UrlError::UnsupportedScheme(_),
                ..
            }
        ));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_parse_destination_drops_fragment() {
        let url = parse_destination("https://example.com:8443/a b?x=1#frag").unwrap();
        assert_eq!(url.as_str(), "https://example.com:8443/a%20b?x=1");
    }

    #[test]
    fn test_request_without_destination() {
        let mut client = RequestClient::basic_auth("user", "pass");
        assert!(matches!(client.get_string(), Err(Error::NoDestination)));
    }

    #[test]
    fn test_reconnect_replaces_connection() {
        let mut client = RequestClient::basic_auth("user", "pass");
        client.connect("http://127.0.0.1:9/one").unwrap();
        client.connect("http://127.0.0.1:9/two").unwrap();

        assert_eq!(client.connection().unwrap().url().path(), "/two");

        client.disconnect();
        client.disconnect();
        assert!(!client.is_connected());
    }

    #[test]
    fn test_failed_connect_leaves_client_disconnected() {
        let mut client = RequestClient::basic_auth("user", "pass");
        client.connect("http://127.0.0.1:9/one").unwrap();
        assert!(client.connect("mailto:someone@example.com").is_err());
        assert!(!client.is_connected());
    }

    #[test]
    fn test_transport_failure_disconnects() {
        // Bind then drop to get a port nobody listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let mut client = RequestClient::basic_auth("user", "pass");
        client.connect(&format!("http://127.0.0.1:{}/", port)).unwrap();

        let err = client.get_string().unwrap_err();
        assert!(err.is_transport());
        assert!(!client.is_connected());
    }

    #[test]
    fn test_read_string_widens_bytes() {
        let body = read_string(Cursor::new("naïve".as_bytes()), BodyDecoding::Latin1).unwrap();
        assert_eq!(body, "naÃ¯ve");
        assert_eq!(body.chars().count(), 6);

        let body = read_string(Cursor::new("naïve".as_bytes()), BodyDecoding::Utf8Lossy).unwrap();
        assert_eq!(body, "naïve");
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn test_read_string_error() {
        let err = read_string(Broken, BodyDecoding::Latin1).unwrap_err();
        assert!(matches!(err, Error::Read(_)));
    }

    #[test]
    fn test_codec_accessor() {
        let client = RequestClient::builder()
            .codec(SerdeJson::pretty())
            .basic_auth("user", "pass")
            .build();
        let text = client.codec().serialize(&[1, 2]).unwrap();
        assert_eq!(text, "[\n  1,\n  2\n]");
        assert_eq!(<RequestClient as JsonClient>::ENCODING, "UTF-8");
    }
}

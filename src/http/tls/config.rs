//! TLS configuration
//!
//! `TlsConfig` is an immutable, cloneable description of how to secure an
//! outbound connection: which CAs to trust, whether to verify the peer, the
//! protocol range, and optionally the client identity presented during the
//! handshake.

use super::cert::CertInfo;
use super::session::TlsSession;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode, SslVersion};
use openssl::x509::X509;
use std::fmt;
use std::fs;
use std::net::TcpStream;
use std::path::Path;
use std::str::FromStr;

/// TLS version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// TLS 1.0
    Tls10,
    /// TLS 1.1
    Tls11,
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(&self) -> SslVersion {
        match self {
            TlsVersion::Tls10 => SslVersion::TLS1,
            TlsVersion::Tls11 => SslVersion::TLS1_1,
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    /// Get version as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }
}

impl FromStr for TlsVersion {
    type Err = TlsError;

    /// Parse TLS version from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self, TlsError> {
        match s.to_uppercase().as_str() {
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" => Ok(TlsVersion::Tls10),
            "TLSV1.1" | "TLS1.1" => Ok(TlsVersion::Tls11),
            "TLSV1.2" | "TLS1.2" => Ok(TlsVersion::Tls12),
            "TLSV1.3" | "TLS1.3" => Ok(TlsVersion::Tls13),
            _ => Err(TlsError::InvalidVersion(s.to_string())),
        }
    }
}

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TLS version: {0}")]
    InvalidVersion(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),
}

/// Client identity presented during the handshake
#[derive(Clone)]
struct Identity {
    cert: X509,
    key: PKey<Private>,
    chain: Vec<X509>,
}

/// TLS configuration (immutable after building)
#[derive(Clone)]
pub struct TlsConfig {
    identity: Option<Identity>,
    ca_certs: Vec<X509>,
    verify_peer: bool,
    min_version: Option<TlsVersion>,
    max_version: Option<TlsVersion>,
}

impl TlsConfig {
    /// Create a new client configuration builder
    pub fn client() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Whether a client certificate is configured
    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    /// Details of the configured client certificate
    pub fn identity_info(&self) -> Option<CertInfo> {
        self.identity
            .as_ref()
            .map(|identity| CertInfo::from_x509(&identity.cert))
    }

    /// Whether the server certificate and host name are verified
    pub fn verify_peer(&self) -> bool {
        self.verify_peer
    }

    /// A copy of this configuration with the client identity removed
    ///
    /// Keeps the trust settings; used when another authentication mode wins.
    pub fn without_identity(&self) -> TlsConfig {
        TlsConfig {
            identity: None,
            ..self.clone()
        }
    }

    /// Build the connector (socket factory) for one connection handle
    pub fn connector(&self) -> Result<TlsConnector, TlsError> {
        let mut builder = SslConnector::builder(SslMethod::tls_client())?;

        builder.set_min_proto_version(self.min_version.map(|v| v.to_openssl_version()))?;
        builder.set_max_proto_version(self.max_version.map(|v| v.to_openssl_version()))?;

        for ca in &self.ca_certs {
            builder.cert_store_mut().add_cert(ca.clone())?;
        }

        if let Some(identity) = &self.identity {
            builder.set_certificate(&identity.cert)?;
            builder.set_private_key(&identity.key)?;
            for cert in &identity.chain {
                builder.add_extra_chain_cert(cert.clone())?;
            }
            builder.check_private_key()?;
        }

        builder.set_verify(if self.verify_peer {
            SslVerifyMode::PEER
        } else {
            SslVerifyMode::NONE
        });

        Ok(TlsConnector {
            connector: builder.build(),
            verify_peer: self.verify_peer,
            identity_attached: self.identity.is_some(),
        })
    }
}

impl Default for TlsConfig {
    /// Verify the peer against the system trust store, no client identity
    fn default() -> Self {
        TlsConfig {
            identity: None,
            ca_certs: Vec::new(),
            verify_peer: true,
            min_version: None,
            max_version: None,
        }
    }
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("identity", &self.identity_info().map(|info| info.subject))
            .field("ca_certs", &self.ca_certs.len())
            .field("verify_peer", &self.verify_peer)
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .finish()
    }
}

/// Per-connection socket factory built from a `TlsConfig`
#[derive(Clone)]
pub struct TlsConnector {
    connector: SslConnector,
    verify_peer: bool,
    identity_attached: bool,
}

impl TlsConnector {
    /// Whether the client identity is attached to this connector
    pub fn identity_attached(&self) -> bool {
        self.identity_attached
    }

    /// Secure a connected TCP stream (performs the handshake)
    ///
    /// `domain` is used for SNI and, when peer verification is on, for host
    /// name verification. IP addresses are verified against IP SANs.
    pub fn connect(&self, domain: &str, stream: TcpStream) -> Result<TlsSession, TlsError> {
        let mut config = self.connector.configure()?;
        if !self.verify_peer {
            config.set_verify_hostname(false);
        }

        let stream = config
            .connect(domain, stream)
            .map_err(|e| TlsError::HandshakeFailed(e.to_string()))?;

        Ok(TlsSession::new(stream))
    }
}

/// Client configuration builder
pub struct ClientConfigBuilder {
    identity: Option<Identity>,
    ca_certs: Vec<X509>,
    verify_peer: bool,
    min_version: Option<TlsVersion>,
    max_version: Option<TlsVersion>,
}

impl ClientConfigBuilder {
    fn new() -> Self {
        ClientConfigBuilder {
            identity: None,
            ca_certs: Vec::new(),
            verify_peer: true,
            min_version: None,
            max_version: None,
        }
    }

    /// Set TLS version (both min and max)
    pub fn version(self, version: TlsVersion) -> Self {
        self.version_range(version, version)
    }

    /// Set TLS version range
    pub fn version_range(mut self, min: TlsVersion, max: TlsVersion) -> Self {
        self.min_version = Some(min);
        self.max_version = Some(max);
        self
    }

    /// Enable/disable peer certificate and host name verification
    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        self
    }

    /// Load the client certificate and private key from one PEM file
    ///
    /// Certificates after the first one are sent as the chain.
    pub fn cert_file<P: AsRef<Path>>(self, path: P) -> Result<Self, TlsError> {
        let pem = fs::read(path.as_ref())?;
        self.identity_pem(&pem, &pem)
    }

    /// Set the client certificate (plus optional chain) and private key
    pub fn identity_pem(mut self, cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, TlsError> {
        let mut certs = X509::stack_from_pem(cert_pem)
            .map_err(|e| TlsError::Certificate(format!("Failed to load certificate: {}", e)))?
            .into_iter();
        let cert = certs
            .next()
            .ok_or_else(|| TlsError::Certificate("No certificate found in PEM".to_string()))?;

        let key = PKey::private_key_from_pem(key_pem)
            .map_err(|e| TlsError::Certificate(format!("Failed to load private key: {}", e)))?;

        self.identity = Some(Identity {
            cert,
            key,
            chain: certs.collect(),
        });
        Ok(self)
    }

    /// Load the client identity from a PKCS#12 archive
    pub fn pkcs12(mut self, der: &[u8], password: &str) -> Result<Self, TlsError> {
        let parsed = Pkcs12::from_der(der)?
            .parse2(password)
            .map_err(|e| TlsError::Certificate(format!("Failed to open PKCS#12 archive: {}", e)))?;

        let (Some(cert), Some(key)) = (parsed.cert, parsed.pkey) else {
            return Err(TlsError::Certificate(
                "PKCS#12 archive lacks a certificate or key".to_string(),
            ));
        };

        self.identity = Some(Identity {
            cert,
            key,
            chain: parsed
                .ca
                .map(|stack| stack.into_iter().collect())
                .unwrap_or_default(),
        });
        Ok(self)
    }

    /// Trust the CA certificates in a PEM file
    pub fn ca_file<P: AsRef<Path>>(self, path: P) -> Result<Self, TlsError> {
        let pem = fs::read(path.as_ref())?;
        self.ca_pem(&pem)
    }

    /// Trust the CA certificates in a PEM buffer
    pub fn ca_pem(mut self, pem: &[u8]) -> Result<Self, TlsError> {
        let certs = X509::stack_from_pem(pem)
            .map_err(|e| TlsError::Certificate(format!("Failed to load CA certificate: {}", e)))?;
        if certs.is_empty() {
            return Err(TlsError::Certificate("No CA certificate found in PEM".to_string()));
        }
        self.ca_certs.extend(certs);
        Ok(self)
    }

    /// Build the TLS configuration
    pub fn build(self) -> Result<TlsConfig, TlsError> {
        if let (Some(min), Some(max)) = (self.min_version, self.max_version) {
            if min > max {
                return Err(TlsError::InvalidConfig(format!(
                    "minimum version {} is above maximum {}",
                    min.as_str(),
                    max.as_str()
                )));
            }
        }

        if let Some(identity) = &self.identity {
            let public = identity.cert.public_key()?;
            if !public.public_eq(&identity.key) {
                return Err(TlsError::Certificate(
                    "Private key does not match the certificate".to_string(),
                ));
            }
        }

        Ok(TlsConfig {
            identity: self.identity,
            ca_certs: self.ca_certs,
            verify_peer: self.verify_peer,
            min_version: self.min_version,
            max_version: self.max_version,
        })
    }
}

//! Loopback servers, certificates and log capture shared by the integration
//! tests

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslAcceptor, SslMethod, SslVerifyMode};
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use std::io::{self, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

/// A request as the server saw it
#[derive(Debug, Clone)]
pub struct Request {
    pub head: String,
    pub body: Vec<u8>,
}

impl Request {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }
}

/// Read one request head plus its `Content-Length` body
pub fn read_request<S: Read>(stream: &mut S) -> io::Result<Request> {
    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];

    let head_end = loop {
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "closed before end of request head",
            ));
        }
        raw.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&raw[..head_end]).into_owned();
    let mut request = Request {
        head,
        body: raw[head_end..].to_vec(),
    };

    let length: usize = request
        .header("Content-Length")
        .map(|v| v.parse().unwrap())
        .unwrap_or(0);
    while request.body.len() < length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        request.body.extend_from_slice(&buf[..n]);
    }

    Ok(request)
}

/// A full response with `Content-Length`
pub fn response(status_line: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
        status_line,
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

/// Plain HTTP server answering `count` connections, one request each
///
/// Returns the base URL and a handle yielding the requests received.
pub fn serve<F>(count: usize, handler: F) -> (String, thread::JoinHandle<Vec<Request>>)
where
    F: Fn(&Request) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for _ in 0..count {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream).unwrap();
            stream.write_all(&handler(&request)).unwrap();
            let _ = stream.shutdown(std::net::Shutdown::Write);
            seen.push(request);
        }
        seen
    });

    (base, handle)
}

/// Serve a single canned response
pub fn serve_raw(reply: Vec<u8>) -> (String, thread::JoinHandle<Vec<Request>>) {
    serve(1, move |_| reply.clone())
}

/// What the TLS server observed on one connection
#[derive(Debug)]
pub struct TlsExchange {
    pub request: Request,
    /// Common name of the client certificate, if one was presented
    pub peer_cn: Option<String>,
}

/// HTTPS server answering one connection
///
/// The handshake error is returned when the client is rejected or rejects
/// the server.
pub fn serve_tls<F>(
    acceptor: SslAcceptor,
    handler: F,
) -> (String, thread::JoinHandle<Result<TlsExchange, String>>)
where
    F: Fn(&Request) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("https://{}", listener.local_addr().unwrap());

    let handle = thread::spawn(move || -> Result<TlsExchange, String> {
        let (stream, _) = listener.accept().map_err(|e| e.to_string())?;
        let mut stream = acceptor.accept(stream).map_err(|e| e.to_string())?;

        let peer_cn = stream.ssl().peer_certificate().and_then(|cert| {
            cert.subject_name()
                .entries_by_nid(Nid::COMMONNAME)
                .next()
                .and_then(|entry| entry.data().as_utf8().ok())
                .map(|cn| cn.to_string())
        });

        let request = read_request(&mut stream).map_err(|e| e.to_string())?;
        stream
            .write_all(&handler(&request))
            .map_err(|e| e.to_string())?;
        let _ = stream.shutdown();

        Ok(TlsExchange { request, peer_cn })
    });

    (base, handle)
}

/// Throwaway CA with a server and a client certificate
pub struct Pki {
    pub ca: X509,
    pub server_cert: X509,
    pub server_key: PKey<Private>,
    pub client_cert: X509,
    pub client_key: PKey<Private>,
}

impl Pki {
    pub fn generate() -> Self {
        let ca_key = ec_key();
        let ca = issue("Test Root CA", &ca_key, None, Role::Ca);

        let server_key = ec_key();
        let server_cert = issue("localhost", &server_key, Some((&ca, &ca_key)), Role::Server);

        let client_key = ec_key();
        let client_cert = issue("device-0042", &client_key, Some((&ca, &ca_key)), Role::Client);

        Pki {
            ca,
            server_cert,
            server_key,
            client_cert,
            client_key,
        }
    }

    pub fn ca_pem(&self) -> Vec<u8> {
        self.ca.to_pem().unwrap()
    }

    pub fn client_cert_pem(&self) -> Vec<u8> {
        self.client_cert.to_pem().unwrap()
    }

    pub fn client_key_pem(&self) -> Vec<u8> {
        self.client_key.private_key_to_pem_pkcs8().unwrap()
    }

    /// Server acceptor, optionally demanding a client certificate from this CA
    pub fn acceptor(&self, require_client_cert: bool) -> SslAcceptor {
        let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
        builder.set_private_key(&self.server_key).unwrap();
        builder.set_certificate(&self.server_cert).unwrap();
        builder.check_private_key().unwrap();

        if require_client_cert {
            builder.cert_store_mut().add_cert(self.ca.clone()).unwrap();
            builder.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);
        }

        builder.build()
    }
}

enum Role {
    Ca,
    Server,
    Client,
}

fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn issue(
    cn: &str,
    key: &PKey<Private>,
    issuer: Option<(&X509, &PKey<Private>)>,
    role: Role,
) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", cn).unwrap();
    let name = name.build();

    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    match issuer {
        Some((cert, _)) => builder.set_issuer_name(cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(2).unwrap())
        .unwrap();

    match role {
        Role::Ca => {
            builder
                .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
                .unwrap();
            builder
                .append_extension(
                    KeyUsage::new()
                        .critical()
                        .key_cert_sign()
                        .crl_sign()
                        .build()
                        .unwrap(),
                )
                .unwrap();
        }
        Role::Server => {
            builder
                .append_extension(ExtendedKeyUsage::new().server_auth().build().unwrap())
                .unwrap();
            let san = SubjectAlternativeName::new()
                .dns("localhost")
                .ip("127.0.0.1")
                .build(&builder.x509v3_context(issuer.map(|(cert, _)| &**cert), None))
                .unwrap();
            builder.append_extension(san).unwrap();
        }
        Role::Client => {
            builder
                .append_extension(ExtendedKeyUsage::new().client_auth().build().unwrap())
                .unwrap();
        }
    }

    let signing_key = issuer.map(|(_, key)| key).unwrap_or(key);
    builder.sign(signing_key, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// Collects formatted `tracing` output
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Run `f` with a subscriber writing INFO and above into this capture
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        self.run_at(tracing::Level::INFO, f)
    }

    /// Run `f` with a subscriber writing `level` and above into this capture
    pub fn run_at<T>(&self, level: tracing::Level, f: impl FnOnce() -> T) -> T {
        let capture = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(move || capture.clone())
            .with_ansi(false)
            .with_target(false)
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, f)
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

//! Certificate inspection
//!
//! Extracts the few X.509 fields worth logging or asserting on: subject and
//! issuer common names plus subject alternative names.

use openssl::nid::Nid;
use openssl::x509::{X509NameRef, X509Ref};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Certificate information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    /// Certificate subject (Common Name)
    pub subject: String,
    /// Certificate issuer (Common Name)
    pub issuer: String,
    /// Subject Alternative Names (DNS names and IP addresses)
    pub subject_alt_names: Vec<String>,
}

impl CertInfo {
    /// Extract certificate information from an X.509 certificate
    pub fn from_x509(cert: &X509Ref) -> Self {
        CertInfo {
            subject: common_name(cert.subject_name()),
            issuer: common_name(cert.issuer_name()),
            subject_alt_names: subject_alt_names(cert),
        }
    }
}

fn common_name(name: &X509NameRef) -> String {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "<undef>".to_string())
}

fn subject_alt_names(cert: &X509Ref) -> Vec<String> {
    let Some(names) = cert.subject_alt_names() else {
        return Vec::new();
    };

    names
        .iter()
        .filter_map(|name| {
            if let Some(dns) = name.dnsname() {
                return Some(format!("DNS:{}", dns));
            }
            let ip = match name.ipaddress()? {
                &[a, b, c, d] => IpAddr::V4(Ipv4Addr::new(a, b, c, d)),
                octets => {
                    let octets: [u8; 16] = octets.try_into().ok()?;
                    IpAddr::V6(Ipv6Addr::from(octets))
                }
            };
            Some(format!("IP:{}", ip))
        })
        .collect()
}

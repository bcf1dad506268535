//! Pick the certificate that represents a host out of a handshake chain.
//!
//! The peer may send its certificates in any order and may include extra
//! ones. A certificate is "for this host" when its SAN list contains the
//! hostname verbatim, or the wildcard form of it (`*` followed by the
//! hostname from its first dot on). Everything else is kept aside as
//! chain-completion material for verification; none of it is trusted.

mod summary;

pub use summary::{CertificateSummary, ParseError};

use rustls::pki_types::CertificateDer;
use tracing::trace;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::{FromDer, X509Certificate};

/// Result of splitting a chain for one hostname.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub leaf: Option<CertificateDer<'static>>,
    pub intermediates: Vec<CertificateDer<'static>>,
}

/// The last certificate (in handshake order) valid for `hostname` becomes the
/// leaf; earlier matches and everything else become intermediates.
pub fn select(chain: &[CertificateDer<'static>], hostname: &str) -> Selection {
    let wildcard = wildcard_for(hostname);
    let mut selection = Selection::default();
    for cert in chain {
        let names = dns_names(cert);
        let hit = matches_host(&names, hostname, wildcard.as_deref());
        trace!(host = hostname, names = ?names, hit, "inspecting peer certificate");
        if hit {
            if let Some(previous) = selection.leaf.replace(cert.clone()) {
                selection.intermediates.push(previous);
            }
        } else {
            selection.intermediates.push(cert.clone());
        }
    }
    selection
}

/// `a.b.example.com` -> `*.b.example.com`. A name without a dot has no wildcard form.
pub fn wildcard_for(hostname: &str) -> Option<String> {
    hostname.find('.').map(|idx| format!("*{}", &hostname[idx..]))
}

fn matches_host(names: &[String], hostname: &str, wildcard: Option<&str>) -> bool {
    names
        .iter()
        .any(|n| n == hostname || wildcard.map(|w| n == w).unwrap_or(false))
}

/// DNS entries of the SAN extension. Unparsable certificates have none.
pub fn dns_names(cert: &CertificateDer<'_>) -> Vec<String> {
    let mut out = Vec::new();
    if let Ok((_, x509)) = X509Certificate::from_der(cert.as_ref()) {
        if let Ok(Some(san)) = x509.subject_alternative_name() {
            for name in &san.value.general_names {
                if let GeneralName::DNSName(dns) = name {
                    out.push(dns.to_string());
                }
            }
        }
    }
    out
}

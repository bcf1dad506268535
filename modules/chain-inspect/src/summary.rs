use rustls::pki_types::CertificateDer;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use x509_parser::prelude::{FromDer, X509Certificate, X509Name};

#[derive(Debug, Error)]
#[error("unable to parse certificate: {0}")]
pub struct ParseError(String);

/// The parts of a leaf certificate reported to metrics and the status page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    pub version: u32,
    pub serial_number: String,
    pub subject_common_name: String,
    pub issuer_common_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    pub subject_alternative_names: Vec<String>,
    pub sha256_fingerprint: String,
}

impl CertificateSummary {
    pub fn from_der(der: &CertificateDer<'_>) -> Result<Self, ParseError> {
        let (_, x509) =
            X509Certificate::from_der(der.as_ref()).map_err(|e| ParseError(e.to_string()))?;
        Ok(CertificateSummary {
            // v3 is encoded as 2
            version: x509.version().0 + 1,
            serial_number: x509.serial.to_string(),
            subject_common_name: common_name(x509.subject()),
            issuer_common_name: common_name(x509.issuer()),
            not_before: x509.validity().not_before.to_datetime(),
            not_after: x509.validity().not_after.to_datetime(),
            subject_alternative_names: crate::dns_names(der),
            sha256_fingerprint: hex::encode(Sha256::digest(der.as_ref())),
        })
    }

    /// Expiry as Unix seconds, the unit the expiry gauge is published in.
    pub fn expires_unix(&self) -> i64 {
        self.not_after.unix_timestamp()
    }
}

fn common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_pki::Authority;
    use time::Duration;

    #[test]
    fn summary_fields() {
        let root = Authority::root("Summary Root");
        let not_after = OffsetDateTime::now_utc().replace_nanosecond(0).unwrap() + Duration::days(20);
        let leaf = root.leaf_valid_until(&["svc.example.com", "*.svc.example.com"], not_after);

        let s = CertificateSummary::from_der(&leaf.der).unwrap();
        assert_eq!(s.version, 3);
        assert_eq!(s.subject_common_name, "svc.example.com");
        assert_eq!(s.issuer_common_name, "Summary Root");
        assert_eq!(s.not_after, not_after);
        assert_eq!(s.expires_unix(), not_after.unix_timestamp());
        assert_eq!(s.subject_alternative_names, vec!["svc.example.com", "*.svc.example.com"]);
        assert_eq!(s.sha256_fingerprint.len(), 64);
        assert!(!s.serial_number.is_empty());
    }

    #[test]
    fn serializes_times_as_rfc3339() {
        let root = Authority::root("Root");
        let leaf = root.leaf(&["example.com"]);
        let s = CertificateSummary::from_der(&leaf.der).unwrap();
        let v = serde_json::to_value(&s).unwrap();
        assert!(v["not_after"].as_str().unwrap().ends_with('Z'));
        assert_eq!(v["subject_alternative_names"][0], "example.com");
    }

    #[test]
    fn rejects_garbage() {
        let junk = CertificateDer::from(vec![1u8, 2, 3]);
        assert!(CertificateSummary::from_der(&junk).is_err());
    }
}

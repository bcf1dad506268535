use rustls::client::{verify_server_cert_signed_by_trust_anchor, verify_server_name};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use trust_store::TrustStore;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid server name {0:?}")]
    ServerName(String),
    #[error("certificate rejected: {0}")]
    Rejected(#[from] rustls::Error),
}

/// Chain verification against the trust store. Intermediates only complete
/// the chain; they are never anchors.
#[derive(Debug, Clone)]
pub struct Verifier {
    trust: TrustStore,
    algorithms: WebPkiSupportedAlgorithms,
}

impl Verifier {
    pub fn new(trust: TrustStore) -> Self {
        Verifier {
            trust,
            algorithms: rustls::crypto::ring::default_provider().signature_verification_algorithms,
        }
    }

    /// Checks signatures up to an anchor, validity at `now`, and that the
    /// leaf is valid for `hostname`.
    pub fn verify(
        &self,
        leaf: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        hostname: &str,
        now: OffsetDateTime,
    ) -> Result<(), VerifyError> {
        let parsed = ParsedCertificate::try_from(leaf)?;
        verify_server_cert_signed_by_trust_anchor(
            &parsed,
            self.trust.roots(),
            intermediates,
            unix_time(now),
            self.algorithms.all,
        )?;
        let server_name = ServerName::try_from(hostname)
            .map_err(|_| VerifyError::ServerName(hostname.to_string()))?;
        verify_server_name(&parsed, &server_name)?;
        Ok(())
    }
}

fn unix_time(at: OffsetDateTime) -> UnixTime {
    UnixTime::since_unix_epoch(Duration::from_secs(at.unix_timestamp().max(0) as u64))
}

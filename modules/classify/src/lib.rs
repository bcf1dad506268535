//! Single-probe classification.
//!
//! Ordered guard checks, first match wins:
//! transport failure -> `GeneralFailure`; no leaf for the host -> `NotFound`;
//! chain does not verify -> `Invalid`; leaf expires inside the warning
//! window -> `ExpiresSoon`; otherwise `OK`.

mod verifier;

pub use verifier::{VerifyError, Verifier};

use certcheck_core::{ProbeKind, Target};
use chain_inspect::CertificateSummary;
use rustls::pki_types::CertificateDer;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tls_probe::{ChainFetcher, HandshakeOutcome, TransportError};
use tracing::{debug, error};
use trust_store::TrustStore;

/// Result of one classification. Replaces the previous outcome for its host.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub kind: ProbeKind,
    pub leaf: Option<CertificateDer<'static>>,
    pub certificate: Option<CertificateSummary>,
    pub checked_at: OffsetDateTime,
    /// Underlying cause for `Invalid` and `GeneralFailure`.
    pub detail: Option<String>,
}

impl ProbeOutcome {
    fn without_leaf(kind: ProbeKind, checked_at: OffsetDateTime, detail: Option<String>) -> Self {
        ProbeOutcome { kind, leaf: None, certificate: None, checked_at, detail }
    }

    fn with_leaf(
        kind: ProbeKind,
        leaf: CertificateDer<'static>,
        certificate: Option<CertificateSummary>,
        checked_at: OffsetDateTime,
        detail: Option<String>,
    ) -> Self {
        ProbeOutcome { kind, leaf: Some(leaf), certificate, checked_at, detail }
    }
}

pub struct ProbeClassifier {
    fetcher: Arc<dyn ChainFetcher>,
    verifier: Verifier,
    expire_warning: Duration,
    deadline: Duration,
}

impl ProbeClassifier {
    pub fn new(fetcher: Arc<dyn ChainFetcher>, trust: TrustStore, expire_warning: Duration) -> Self {
        ProbeClassifier {
            fetcher,
            verifier: Verifier::new(trust),
            expire_warning,
            deadline: Duration::from_secs(30),
        }
    }

    /// Upper bound for the whole connect step of one probe.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn expire_warning(&self) -> Duration {
        self.expire_warning
    }

    /// Probe `target` and classify the result. Never fails; transport
    /// problems become `GeneralFailure`.
    pub async fn run(&self, target: &Target) -> ProbeOutcome {
        let fetched = tokio::time::timeout(self.deadline, self.fetcher.fetch(target))
            .await
            .unwrap_or(Err(TransportError::Timeout("probe")));
        let handshake = match fetched {
            Ok(h) => h,
            Err(e) => {
                error!(host = target.key(), error = %e, "HTTP request failed");
                return ProbeOutcome::without_leaf(
                    ProbeKind::GeneralFailure,
                    OffsetDateTime::now_utc(),
                    Some(e.to_string()),
                );
            }
        };
        if let HandshakeOutcome::RedirectEncountered { status, location, .. } = &handshake {
            debug!(host = target.key(), status, location = ?location, "redirect found, inspecting handshake chain");
        }
        self.classify(handshake.chain(), target.hostname(), OffsetDateTime::now_utc())
    }

    /// Steps after the handshake: select the leaf, verify, check expiry.
    pub fn classify(
        &self,
        chain: &[CertificateDer<'static>],
        hostname: &str,
        now: OffsetDateTime,
    ) -> ProbeOutcome {
        let selection = chain_inspect::select(chain, hostname);
        let Some(leaf) = selection.leaf else {
            debug!(host = hostname, "certificate not found");
            return ProbeOutcome::without_leaf(ProbeKind::NotFound, now, None);
        };
        let summary = CertificateSummary::from_der(&leaf).ok();

        if let Err(e) = self.verifier.verify(&leaf, &selection.intermediates, hostname, now) {
            debug!(host = hostname, error = %e, "certificate invalid");
            return ProbeOutcome::with_leaf(ProbeKind::Invalid, leaf, summary, now, Some(e.to_string()));
        }
        let Some(summary) = summary else {
            return ProbeOutcome::with_leaf(
                ProbeKind::Invalid,
                leaf,
                None,
                now,
                Some("leaf certificate could not be decoded".into()),
            );
        };

        let remaining = summary.not_after - now;
        let window = time::Duration::try_from(self.expire_warning).unwrap_or(time::Duration::MAX);
        if remaining < window {
            debug!(host = hostname, "certificate expires soon");
            return ProbeOutcome::with_leaf(ProbeKind::ExpiresSoon, leaf, Some(summary), now, None);
        }

        debug!(host = hostname, "certificate OK");
        ProbeOutcome::with_leaf(ProbeKind::Ok, leaf, Some(summary), now, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rustls::RootCertStore;
    use test_pki::{self_signed_leaf, Authority};

    const DAY: u64 = 24 * 3600;

    enum Fake {
        Completed(Vec<CertificateDer<'static>>),
        Redirect(Vec<CertificateDer<'static>>),
        Refused,
        Hang,
    }

    #[async_trait]
    impl ChainFetcher for Fake {
        async fn fetch(&self, _target: &Target) -> Result<HandshakeOutcome, TransportError> {
            match self {
                Fake::Completed(chain) => Ok(HandshakeOutcome::Completed { status: 200, chain: chain.clone() }),
                Fake::Redirect(chain) => Ok(HandshakeOutcome::RedirectEncountered {
                    status: 302,
                    location: Some("https://example.com/login".into()),
                    chain: chain.clone(),
                }),
                Fake::Refused => Err(TransportError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused))),
                Fake::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    unreachable!()
                }
            }
        }
    }

    fn trust(root: &Authority) -> TrustStore {
        let mut store = RootCertStore::empty();
        store.add(root.der()).unwrap();
        TrustStore::from_root_store(store)
    }

    fn classifier(fake: Fake, root: &Authority, window_days: u64) -> ProbeClassifier {
        ProbeClassifier::new(Arc::new(fake), trust(root), Duration::from_secs(window_days * DAY))
    }

    fn target() -> Target {
        Target::parse("https://example.com").unwrap()
    }

    fn whole_second_now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(OffsetDateTime::now_utc().unix_timestamp()).unwrap()
    }

    #[tokio::test]
    async fn valid_chain_is_ok() {
        let root = Authority::root("Root");
        let inter = root.intermediate("Intermediate");
        let leaf = inter.leaf(&["example.com"]);
        let c = classifier(Fake::Completed(vec![leaf.der.clone(), inter.der()]), &root, 30);

        let out = c.run(&target()).await;
        assert_eq!(out.kind, ProbeKind::Ok);
        assert_eq!(out.leaf, Some(leaf.der));
        assert_eq!(out.certificate.unwrap().subject_common_name, "example.com");
        assert!(out.detail.is_none());
    }

    #[tokio::test]
    async fn missing_intermediate_is_invalid_with_leaf() {
        let root = Authority::root("Root");
        let inter = root.intermediate("Intermediate");
        let leaf = inter.leaf(&["example.com"]);
        let c = classifier(Fake::Completed(vec![leaf.der.clone()]), &root, 30);

        let out = c.run(&target()).await;
        assert_eq!(out.kind, ProbeKind::Invalid);
        assert_eq!(out.leaf, Some(leaf.der));
        assert!(out.certificate.is_some());
        assert!(out.detail.is_some());
    }

    #[tokio::test]
    async fn self_signed_is_invalid() {
        let root = Authority::root("Root");
        let leaf = self_signed_leaf(&["example.com"]);
        let c = classifier(Fake::Completed(vec![leaf.der.clone()]), &root, 30);
        assert_eq!(c.run(&target()).await.kind, ProbeKind::Invalid);
    }

    #[tokio::test]
    async fn no_matching_certificate_is_not_found() {
        let root = Authority::root("Root");
        let leaf = root.leaf(&["other.org"]);
        let c = classifier(Fake::Completed(vec![leaf.der.clone()]), &root, 30);

        let out = c.run(&target()).await;
        assert_eq!(out.kind, ProbeKind::NotFound);
        assert!(out.leaf.is_none());
        assert!(out.certificate.is_none());
    }

    #[tokio::test]
    async fn empty_chain_is_not_found() {
        let root = Authority::root("Root");
        let c = classifier(Fake::Completed(Vec::new()), &root, 30);
        assert_eq!(c.run(&target()).await.kind, ProbeKind::NotFound);
    }

    #[tokio::test]
    async fn wildcard_leaf_verifies() {
        let root = Authority::root("Root");
        let leaf = root.leaf(&["*.example.com"]);
        let c = classifier(Fake::Completed(vec![leaf.der.clone()]), &root, 30);
        let out = c.run(&Target::parse("https://sub.example.com").unwrap()).await;
        assert_eq!(out.kind, ProbeKind::Ok);
    }

    #[tokio::test]
    async fn redirect_still_classifies_the_chain() {
        let root = Authority::root("Root");
        let leaf = root.leaf(&["example.com"]);
        let c = classifier(Fake::Redirect(vec![leaf.der.clone()]), &root, 30);
        let out = c.run(&target()).await;
        assert_eq!(out.kind, ProbeKind::Ok);
        assert_eq!(out.leaf, Some(leaf.der));
    }

    #[tokio::test]
    async fn transport_error_is_general_failure() {
        let root = Authority::root("Root");
        let c = classifier(Fake::Refused, &root, 30);
        let out = c.run(&target()).await;
        assert_eq!(out.kind, ProbeKind::GeneralFailure);
        assert!(out.leaf.is_none());
        assert!(out.detail.is_some());
    }

    #[tokio::test]
    async fn hanging_probe_hits_the_deadline() {
        let root = Authority::root("Root");
        let c = classifier(Fake::Hang, &root, 30).with_deadline(Duration::from_millis(50));
        let out = c.run(&target()).await;
        assert_eq!(out.kind, ProbeKind::GeneralFailure);
        assert_eq!(out.detail.as_deref(), Some("timed out during probe"));
    }

    #[test]
    fn expiry_window() {
        let root = Authority::root("Root");
        let now = whole_second_now();
        let leaf = root.leaf_valid_until(&["example.com"], now + time::Duration::days(10));
        let chain = vec![leaf.der.clone()];

        let wide = classifier(Fake::Refused, &root, 30);
        assert_eq!(wide.classify(&chain, "example.com", now).kind, ProbeKind::ExpiresSoon);

        let narrow = classifier(Fake::Refused, &root, 5);
        assert_eq!(narrow.classify(&chain, "example.com", now).kind, ProbeKind::Ok);
    }

    #[test]
    fn expiry_boundary_is_not_soon() {
        let root = Authority::root("Root");
        let now = whole_second_now();
        let leaf = root.leaf_valid_until(&["example.com"], now + time::Duration::days(30));
        let c = classifier(Fake::Refused, &root, 30);

        let out = c.classify(&[leaf.der.clone()], "example.com", now);
        assert_eq!(out.kind, ProbeKind::Ok);
        let out = c.classify(&[leaf.der], "example.com", now + time::Duration::seconds(1));
        assert_eq!(out.kind, ProbeKind::ExpiresSoon);
    }

    #[test]
    fn expired_leaf_is_invalid_not_soon() {
        let root = Authority::root("Root");
        let now = whole_second_now();
        let leaf = root.leaf_valid_until(&["example.com"], now + time::Duration::hours(1));
        let c = classifier(Fake::Refused, &root, 30);
        let out = c.classify(&[leaf.der], "example.com", now + time::Duration::hours(2));
        assert_eq!(out.kind, ProbeKind::Invalid);
    }
}

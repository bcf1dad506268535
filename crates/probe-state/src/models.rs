use certcheck_core::ProbeKind;
use chain_inspect::CertificateSummary;
use classify::ProbeOutcome;
use serde::Serialize;
use std::time::Duration;
use time::OffsetDateTime;

/// Per-host record as published to collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeRecord {
    pub kind: ProbeKind,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateSummary>,
    #[serde(with = "time::serde::rfc3339")]
    pub checked_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProbeRecord {
    pub fn from_outcome(outcome: &ProbeOutcome, expire_warning: Duration) -> Self {
        ProbeRecord {
            kind: outcome.kind,
            description: outcome.kind.describe(expire_warning),
            certificate: outcome.certificate.clone(),
            checked_at: outcome.checked_at,
            detail: outcome.detail.clone(),
        }
    }
}

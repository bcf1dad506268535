use certcheck_core::{ProbeKind, Target};
use classify::ProbeClassifier;
use probe_state::{ProbeRecord, ProbeStore};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Owns the configured targets and keeps the store up to date.
pub struct Monitor {
    targets: Vec<Target>,
    classifier: Arc<ProbeClassifier>,
    store: Arc<ProbeStore>,
}

impl Monitor {
    pub fn new(targets: Vec<Target>, classifier: ProbeClassifier) -> Self {
        let store = ProbeStore::new(targets.iter().map(|t| t.key().to_string()));
        Monitor { targets, classifier: Arc::new(classifier), store: Arc::new(store) }
    }

    pub fn store(&self) -> Arc<ProbeStore> {
        self.store.clone()
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Probe every target concurrently and replace each host's record.
    /// Waits for the probes only to log the cycle summary.
    pub async fn refresh(&self) {
        let started = Instant::now();
        let mut probes = JoinSet::new();
        for target in self.targets.iter().cloned() {
            let classifier = self.classifier.clone();
            let store = self.store.clone();
            probes.spawn(async move { probe_one(&classifier, &store, &target).await });
        }
        while let Some(joined) = probes.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "probe task failed");
            }
        }

        let counts = self.store.counts();
        let count = |kind: ProbeKind| counts.iter().find(|(k, _)| *k == kind).map(|(_, n)| *n).unwrap_or(0);
        info!(
            hosts = self.targets.len(),
            ok = count(ProbeKind::Ok),
            expires_soon = count(ProbeKind::ExpiresSoon),
            invalid = count(ProbeKind::Invalid),
            not_found = count(ProbeKind::NotFound),
            failed = count(ProbeKind::GeneralFailure),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "refresh finished"
        );
    }

    /// Detached refresh; the caller never has to wait for it.
    pub fn spawn_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move { monitor.refresh().await })
    }
}

async fn probe_one(classifier: &ProbeClassifier, store: &ProbeStore, target: &Target) {
    let outcome = classifier.run(target).await;
    match &outcome.certificate {
        Some(cert) => debug!(
            host = target.key(),
            result = %outcome.kind,
            version = cert.version,
            serial = %cert.serial_number,
            subject = %cert.subject_common_name,
            expires = %cert.not_after,
            issuer = %cert.issuer_common_name,
            alt_names = %cert.subject_alternative_names.join(", "),
            "probe finished"
        ),
        None => debug!(host = target.key(), result = %outcome.kind, "probe finished"),
    }
    let record = ProbeRecord::from_outcome(&outcome, classifier.expire_warning());
    if let Err(e) = store.replace(target.key(), record) {
        error!(host = target.key(), error = %e, "unable to update probe state");
    }
}

/// Ticker for the refresh cadence. The first tick completes immediately.
pub fn ticker(every: Duration) -> Interval {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Every tick starts a detached refresh; a slow cycle never holds up the next one.
pub fn spawn_schedule(monitor: Arc<Monitor>, mut ticker: Interval) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            debug!("scheduled refresh");
            monitor.spawn_refresh();
        }
    })
}

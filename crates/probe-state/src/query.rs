use crate::open::read_slot;
use crate::{ProbeRecord, ProbeStore};
use certcheck_core::ProbeKind;
use std::collections::BTreeMap;
use std::sync::Arc;

impl ProbeStore {
    pub fn get(&self, host: &str) -> Option<Arc<ProbeRecord>> {
        self.slots.get(host).and_then(read_slot)
    }

    /// Every host with its current record; `None` until the first probe lands.
    pub fn snapshot(&self) -> BTreeMap<String, Option<Arc<ProbeRecord>>> {
        self.slots.iter().map(|(h, slot)| (h.clone(), read_slot(slot))).collect()
    }

    /// Liveness signal: true only when every host has been probed and is `OK`.
    pub fn all_ok(&self) -> bool {
        self.slots
            .values()
            .all(|slot| matches!(read_slot(slot), Some(r) if r.kind == ProbeKind::Ok))
    }

    /// Number of hosts per kind, in `ProbeKind::ALL` order. Unprobed hosts are not counted.
    pub fn counts(&self) -> Vec<(ProbeKind, usize)> {
        let snapshot = self.snapshot();
        ProbeKind::ALL
            .iter()
            .map(|kind| {
                let n = snapshot
                    .values()
                    .filter(|r| matches!(r, Some(r) if r.kind == *kind))
                    .count();
                (*kind, n)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::{ProbeRecord, ProbeStore};
    use certcheck_core::ProbeKind;
    use std::time::Duration;
    use time::OffsetDateTime;

    fn record(kind: ProbeKind) -> ProbeRecord {
        ProbeRecord {
            kind,
            description: kind.describe(Duration::from_secs(3600)),
            certificate: None,
            checked_at: OffsetDateTime::now_utc(),
            detail: None,
        }
    }

    #[test]
    fn replace_and_read_back() {
        let store = ProbeStore::new(["a.example:443", "b.example"]);
        assert!(store.get("a.example:443").is_none());
        store.replace("a.example:443", record(ProbeKind::Invalid)).unwrap();
        store.replace("a.example:443", record(ProbeKind::Ok)).unwrap();
        assert_eq!(store.get("a.example:443").unwrap().kind, ProbeKind::Ok);
        assert!(store.get("b.example").is_none());
    }

    #[test]
    fn unknown_host_is_rejected() {
        let store = ProbeStore::new(["a.example"]);
        let err = store.replace("c.example", record(ProbeKind::Ok)).unwrap_err();
        assert_eq!(err.0, "c.example");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn all_ok_requires_every_host_ok() {
        let store = ProbeStore::new(["a", "b"]);
        assert!(!store.all_ok());
        store.replace("a", record(ProbeKind::Ok)).unwrap();
        assert!(!store.all_ok());
        store.replace("b", record(ProbeKind::ExpiresSoon)).unwrap();
        assert!(!store.all_ok());
        store.replace("b", record(ProbeKind::Ok)).unwrap();
        assert!(store.all_ok());
    }

    #[test]
    fn empty_store_is_healthy() {
        assert!(ProbeStore::new(Vec::<String>::new()).all_ok());
    }

    #[test]
    fn counts_by_kind() {
        let store = ProbeStore::new(["a", "b", "c", "d"]);
        store.replace("a", record(ProbeKind::Ok)).unwrap();
        store.replace("b", record(ProbeKind::Ok)).unwrap();
        store.replace("c", record(ProbeKind::NotFound)).unwrap();
        let counts = store.counts();
        assert_eq!(counts[0], (ProbeKind::Ok, 2));
        assert_eq!(counts[1], (ProbeKind::NotFound, 1));
        assert_eq!(counts.iter().map(|(_, n)| n).sum::<usize>(), 3);
    }

    #[test]
    fn concurrent_writers_on_different_hosts() {
        let hosts: Vec<String> = (0..16).map(|i| format!("h{i}.example")).collect();
        let store = ProbeStore::new(hosts.clone());
        std::thread::scope(|s| {
            for (i, host) in hosts.iter().enumerate() {
                let store = &store;
                s.spawn(move || {
                    let kind = if i % 2 == 0 { ProbeKind::Ok } else { ProbeKind::Invalid };
                    for _ in 0..100 {
                        store.replace(host, record(kind)).unwrap();
                        let _ = store.snapshot();
                    }
                });
            }
        });
        for (i, host) in hosts.iter().enumerate() {
            let want = if i % 2 == 0 { ProbeKind::Ok } else { ProbeKind::Invalid };
            assert_eq!(store.get(host).unwrap().kind, want);
        }
    }

    #[test]
    fn record_json_shape() {
        let mut r = record(ProbeKind::ExpiresSoon);
        r.detail = None;
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["kind"], "ExpiresSoon");
        assert_eq!(v["description"], "Certificate expires within 1h");
        assert!(v.get("certificate").is_none());
        assert!(v["checked_at"].is_string());
    }
}

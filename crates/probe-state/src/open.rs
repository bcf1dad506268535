use crate::ProbeRecord;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

type Slot = RwLock<Option<Arc<ProbeRecord>>>;

/// Host -> last outcome. The host set is fixed at construction, so the map
/// itself never changes; each host has its own slot and writers to
/// different hosts never touch the same lock.
#[derive(Debug, Default)]
pub struct ProbeStore {
    pub(crate) slots: BTreeMap<String, Slot>,
}

impl ProbeStore {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slots = hosts.into_iter().map(|h| (h.into(), RwLock::new(None))).collect();
        ProbeStore { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

pub(crate) fn read_slot(slot: &Slot) -> Option<Arc<ProbeRecord>> {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

use crate::{ProbeRecord, ProbeStore};
use std::sync::{Arc, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("host {0:?} is not a configured probe")]
pub struct UnknownHost(pub String);

impl ProbeStore {
    /// Swap in a fully built record for `host`. Readers see either the old
    /// or the new record, never a mix.
    pub fn replace(&self, host: &str, record: ProbeRecord) -> Result<(), UnknownHost> {
        let slot = self.slots.get(host).ok_or_else(|| UnknownHost(host.to_string()))?;
        let record = Arc::new(record);
        *slot.write().unwrap_or_else(PoisonError::into_inner) = Some(record);
        Ok(())
    }
}

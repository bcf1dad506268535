//! Last known outcome per configured host, plus the views the HTTP
//! endpoints are built from.

mod metrics;
mod models;
mod open;
mod query;
mod update;

pub use metrics::render_prometheus;
pub use models::*;
pub use open::ProbeStore;
pub use update::UnknownHost;

//! Core utilities and shared types for the certificate checker.

mod error;
mod kind;
mod target;

pub use error::ConfigError;
pub use kind::ProbeKind;
pub use target::Target;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

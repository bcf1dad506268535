use std::path::PathBuf;
use thiserror::Error;

/// Problems detected while loading configuration. All of them are fatal:
/// the process must not start probing with a partial setup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid probe URL {url:?}: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("probe URL {url:?} uses scheme {scheme:?}; only https can be checked")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("probe host {0:?} is configured more than once")]
    DuplicateTarget(String),

    #[error("unable to read roots directory {path}: {source}")]
    RootsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load certificate {path}: {reason}")]
    RootCertificate { path: PathBuf, reason: String },

    #[error("invalid duration {value:?}: {reason}")]
    InvalidDuration { value: String, reason: String },
}

//! Trust anchors used for chain verification: platform roots plus
//! operator-supplied PEM roots from a directory.

use certcheck_core::ConfigError;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// File extensions treated as certificates inside a roots directory.
const CERT_EXTENSIONS: &[&str] = &["pem", "crt"];

/// Immutable set of trust anchors, cheap to clone and share between probes.
#[derive(Debug, Clone)]
pub struct TrustStore {
    roots: Arc<RootCertStore>,
    custom: usize,
}

impl TrustStore {
    /// Platform roots, plus every certificate file under `roots_dir` when given.
    /// An empty path means platform roots only.
    pub fn build(roots_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let mut store = platform_roots();
        let custom = match roots_dir.filter(|p| !p.as_os_str().is_empty()) {
            Some(dir) => load_roots_dir(dir, &mut store)?,
            None => 0,
        };
        debug!(roots = store.len(), custom, "trust store ready");
        Ok(TrustStore { roots: Arc::new(store), custom })
    }

    /// Use exactly the given anchors, nothing from the platform.
    pub fn from_root_store(store: RootCertStore) -> Self {
        let custom = store.len();
        TrustStore { roots: Arc::new(store), custom }
    }

    pub fn roots(&self) -> &RootCertStore {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of anchors that came from the operator rather than the platform.
    pub fn custom_len(&self) -> usize {
        self.custom
    }
}

/// OS store first; the bundled Mozilla set when the OS gives us nothing usable.
fn platform_roots() -> RootCertStore {
    let mut store = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        warn!(error = %err, "error while loading native roots");
    }
    let (added, ignored) = store.add_parsable_certificates(native.certs);
    if ignored > 0 {
        debug!(ignored, "skipped unparsable native roots");
    }
    if added == 0 {
        debug!("no native roots available, using bundled webpki roots");
        store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }
    store
}

fn load_roots_dir(dir: &Path, store: &mut RootCertStore) -> Result<usize, ConfigError> {
    if !dir.exists() {
        warn!(path = %dir.display(), "roots directory does not exist, using platform roots only");
        return Ok(0);
    }
    let mut files = Vec::new();
    collect_certificate_files(dir, &mut files)?;
    files.sort();
    let mut loaded = 0;
    for path in files {
        loaded += load_pem_file(&path, store)?;
        debug!(path = %path.display(), "loaded root certificate");
    }
    Ok(loaded)
}

fn collect_certificate_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::RootsDir { path: dir.to_path_buf(), source };
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_certificate_files(&path, out)?;
        } else if is_certificate_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_certificate_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| CERT_EXTENSIONS.iter().any(|c| e.eq_ignore_ascii_case(c)))
        .unwrap_or(false)
}

fn load_pem_file(path: &Path, store: &mut RootCertStore) -> Result<usize, ConfigError> {
    let fail = |reason: String| ConfigError::RootCertificate { path: path.to_path_buf(), reason };
    let bytes = fs::read(path).map_err(|e| fail(e.to_string()))?;
    let certs = CertificateDer::pem_slice_iter(&bytes)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| fail(format!("bad PEM: {:?}", e)))?;
    if certs.is_empty() {
        return Err(fail("no certificate found".into()));
    }
    let count = certs.len();
    for cert in certs {
        store.add(cert).map_err(|e| fail(e.to_string()))?;
    }
    Ok(count)
}

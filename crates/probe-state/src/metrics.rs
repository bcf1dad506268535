use crate::ProbeStore;
use std::fmt::Write;

/// Prometheus text exposition of the store.
///
/// `certcheck_valid` is 1 for `OK` and `ExpiresSoon`, 0 otherwise (including
/// hosts not probed yet). `certcheck_expires` is only emitted for hosts whose
/// current record carries a certificate.
pub fn render_prometheus(store: &ProbeStore) -> String {
    let snapshot = store.snapshot();
    let mut out = String::new();

    out.push_str("# HELP certcheck_expires Expiration date in unix timestamp (UTC)\n");
    out.push_str("# TYPE certcheck_expires gauge\n");
    for (host, record) in &snapshot {
        if let Some(cert) = record.as_ref().and_then(|r| r.certificate.as_ref()) {
            let _ = writeln!(out, "certcheck_expires{{host=\"{}\"}} {}", escape_label(host), cert.expires_unix());
        }
    }

    out.push_str("# HELP certcheck_valid Validity of the certificate (0/1)\n");
    out.push_str("# TYPE certcheck_valid gauge\n");
    for (host, record) in &snapshot {
        let valid = record.as_ref().map(|r| r.kind.is_valid()).unwrap_or(false);
        let _ = writeln!(out, "certcheck_valid{{host=\"{}\"}} {}", escape_label(host), u8::from(valid));
    }
    out
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

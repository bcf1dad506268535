use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Classification of a single probe. Closed set; every probe ends in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProbeKind {
    #[serde(rename = "OK")]
    Ok,
    NotFound,
    ExpiresSoon,
    Invalid,
    GeneralFailure,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 5] = [
        ProbeKind::Ok,
        ProbeKind::NotFound,
        ProbeKind::ExpiresSoon,
        ProbeKind::Invalid,
        ProbeKind::GeneralFailure,
    ];

    /// Human readable description. `expire_warning` is the configured window
    /// and only shows up in the `ExpiresSoon` text.
    pub fn describe(self, expire_warning: Duration) -> String {
        match self {
            ProbeKind::Ok => "Certificate OK".to_string(),
            ProbeKind::ExpiresSoon => {
                format!("Certificate expires within {}", format_window(expire_warning))
            }
            ProbeKind::Invalid => {
                "Certificate invalid / intermediate certificates not present".to_string()
            }
            ProbeKind::NotFound => "Did not find a certificate valid for this domain".to_string(),
            ProbeKind::GeneralFailure => "Something went wrong in the request".to_string(),
        }
    }

    /// Whether the certificate is currently usable (valid, possibly expiring soon).
    pub fn is_valid(self) -> bool {
        matches!(self, ProbeKind::Ok | ProbeKind::ExpiresSoon)
    }
}

/// Whole days or hours when the window divides evenly, otherwise humantime's
/// rendering. humantime alone would turn `744h` into months of 30.44 days.
fn format_window(window: Duration) -> String {
    const HOUR: u64 = 3600;
    const DAY: u64 = 24 * HOUR;
    let secs = window.as_secs();
    if window.subsec_nanos() == 0 && secs > 0 {
        match (secs % DAY, secs / DAY, secs % HOUR, secs / HOUR) {
            (0, 1, _, _) => return "1day".to_string(),
            (0, days, _, _) => return format!("{}days", days),
            (_, _, 0, hours) => return format!("{}h", hours),
            _ => {}
        }
    }
    humantime::format_duration(window).to_string()
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProbeKind::Ok => "OK",
            ProbeKind::NotFound => "NotFound",
            ProbeKind::ExpiresSoon => "ExpiresSoon",
            ProbeKind::Invalid => "Invalid",
            ProbeKind::GeneralFailure => "GeneralFailure",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_soon_mentions_window() {
        let text = ProbeKind::ExpiresSoon.describe(Duration::from_secs(744 * 3600));
        assert_eq!(text, "Certificate expires within 31days");
    }

    #[test]
    fn window_uses_whole_units() {
        assert_eq!(format_window(Duration::from_secs(86400)), "1day");
        assert_eq!(format_window(Duration::from_secs(14 * 86400)), "14days");
        assert_eq!(format_window(Duration::from_secs(3600)), "1h");
        assert_eq!(format_window(Duration::from_secs(36 * 3600)), "36h");
        assert_eq!(format_window(Duration::from_secs(90)), "1m 30s");
    }

    #[test]
    fn other_descriptions_ignore_window() {
        let a = ProbeKind::Invalid.describe(Duration::from_secs(1));
        let b = ProbeKind::Invalid.describe(Duration::from_secs(99_999));
        assert_eq!(a, b);
        assert_eq!(ProbeKind::Ok.describe(Duration::ZERO), "Certificate OK");
    }

    #[test]
    fn validity_flags() {
        let valid: Vec<_> = ProbeKind::ALL.iter().filter(|k| k.is_valid()).collect();
        assert_eq!(valid, vec![&ProbeKind::Ok, &ProbeKind::ExpiresSoon]);
    }

    #[test]
    fn display_labels() {
        assert_eq!(ProbeKind::Ok.to_string(), "OK");
        assert_eq!(ProbeKind::ExpiresSoon.to_string(), "ExpiresSoon");
    }
}

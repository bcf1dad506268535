use crate::ConfigError;
use std::fmt;
use std::str::FromStr;
use url::{Host, Url};

/// An endpoint to probe, parsed once from its configured URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    url: Url,
    key: String,
    hostname: String,
    port: u16,
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidTarget {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if url.scheme() != "https" {
            return Err(ConfigError::UnsupportedScheme {
                url: raw.to_string(),
                scheme: url.scheme().to_string(),
            });
        }
        let hostname = match url.host() {
            Some(Host::Domain(d)) => d.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => {
                return Err(ConfigError::InvalidTarget {
                    url: raw.to_string(),
                    reason: "missing host".into(),
                })
            }
        };
        // host_str keeps IPv6 brackets, which is what belongs in a host:port key
        let host_str = url.host_str().unwrap_or(&hostname).to_string();
        let key = match url.port() {
            Some(p) => format!("{}:{}", host_str, p),
            None => host_str,
        };
        let port = url.port_or_known_default().unwrap_or(443);
        Ok(Target { url, key, hostname, port })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `host[:port]` as written in the configuration. Used as the state key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Bare hostname (no port, no brackets); what certificates are matched against.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path plus query, suitable for a request line.
    pub fn request_path(&self) -> String {
        match self.url.query() {
            Some(q) => format!("{}?{}", self.url.path(), q),
            None => self.url.path().to_string(),
        }
    }
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_host() {
        let t = Target::parse("https://example.com").unwrap();
        assert_eq!(t.key(), "example.com");
        assert_eq!(t.hostname(), "example.com");
        assert_eq!(t.port(), 443);
        assert_eq!(t.request_path(), "/");
    }

    #[test]
    fn parse_with_port_and_path() {
        let t = Target::parse("https://a.b.example.com:8443/health?x=1").unwrap();
        assert_eq!(t.key(), "a.b.example.com:8443");
        assert_eq!(t.hostname(), "a.b.example.com");
        assert_eq!(t.port(), 8443);
        assert_eq!(t.request_path(), "/health?x=1");
    }

    #[test]
    fn parse_ipv6_literal() {
        let t = Target::parse("https://[::1]:9443").unwrap();
        assert_eq!(t.key(), "[::1]:9443");
        assert_eq!(t.hostname(), "::1");
    }

    #[test]
    fn reject_non_https() {
        assert!(matches!(
            Target::parse("http://example.com"),
            Err(ConfigError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn reject_garbage() {
        assert!(matches!(Target::parse("not a url"), Err(ConfigError::InvalidTarget { .. })));
    }
}

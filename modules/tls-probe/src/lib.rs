//! Connect to an HTTPS target, send a HEAD request and capture the peer
//! certificate chain presented during the handshake.
//!
//! Certificate validation is switched off at this layer: the chain is
//! returned as-is and verified by the caller.
//! Redirects are never followed; a 3xx answer is reported as its own
//! outcome together with the chain from that handshake.

mod danger;
mod response;

use async_trait::async_trait;
use certcheck_core::Target;
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::ClientConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::{debug, trace};

pub use response::ResponseHead;

const MAX_HEAD_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Bound for each network step (resolve, connect, handshake, write, read).
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        ProbeOptions {
            timeout: Duration::from_secs(10),
            user_agent: format!("certcheck/{}", certcheck_core::version()),
        }
    }
}

/// What a completed handshake plus HEAD exchange produced.
#[derive(Debug, Clone)]
pub enum HandshakeOutcome {
    Completed {
        status: u16,
        chain: Vec<CertificateDer<'static>>,
    },
    /// The server answered with a redirect. The handshake still completed,
    /// so the chain is available.
    RedirectEncountered {
        status: u16,
        location: Option<String>,
        chain: Vec<CertificateDer<'static>>,
    },
}

impl HandshakeOutcome {
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        match self {
            HandshakeOutcome::Completed { chain, .. } => chain,
            HandshakeOutcome::RedirectEncountered { chain, .. } => chain,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to resolve {0}")]
    Resolve(String),
    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out during {0}")]
    Timeout(&'static str),
    #[error("invalid server name {0:?}")]
    InvalidServerName(String),
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] std::io::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed HTTP response: {0}")]
    MalformedResponse(String),
    #[error("TLS client setup failed: {0}")]
    Setup(#[from] rustls::Error),
}

/// Source of handshake outcomes. The classifier only talks to this seam.
#[async_trait]
pub trait ChainFetcher: Send + Sync {
    async fn fetch(&self, target: &Target) -> Result<HandshakeOutcome, TransportError>;
}

/// Real network fetcher over tokio + rustls.
#[derive(Clone)]
pub struct TlsChainFetcher {
    connector: TlsConnector,
    opts: ProbeOptions,
}

impl TlsChainFetcher {
    pub fn new(opts: ProbeOptions) -> Result<Self, TransportError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(danger::AcceptAnyCertificate))
            .with_no_client_auth();
        Ok(TlsChainFetcher {
            connector: TlsConnector::from(Arc::new(config)),
            opts,
        })
    }
}

#[async_trait]
impl ChainFetcher for TlsChainFetcher {
    async fn fetch(&self, target: &Target) -> Result<HandshakeOutcome, TransportError> {
        let t = self.opts.timeout;
        let stream = connect_any(target.hostname(), target.port(), t).await?;

        let server_name = match target.hostname().parse::<std::net::IpAddr>() {
            Ok(ip) => ServerName::IpAddress(ip.into()),
            Err(_) => ServerName::try_from(target.hostname().to_owned())
                .map_err(|_| TransportError::InvalidServerName(target.hostname().to_string()))?,
        };
        let mut tls = timeout(t, self.connector.connect(server_name, stream))
            .await
            .map_err(|_| TransportError::Timeout("handshake"))?
            .map_err(TransportError::Handshake)?;

        let chain: Vec<CertificateDer<'static>> = tls
            .get_ref()
            .1
            .peer_certificates()
            .map(|certs| certs.iter().map(|c| c.clone().into_owned()).collect())
            .unwrap_or_default();
        debug!(host = target.key(), certificates = chain.len(), "handshake complete");

        let req = format!(
            "HEAD {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nAccept: */*\r\nConnection: close\r\n\r\n",
            target.request_path(),
            host_header(target),
            self.opts.user_agent
        );
        timeout(t, tls.write_all(req.as_bytes()))
            .await
            .map_err(|_| TransportError::Timeout("request write"))??;

        let mut buf = Vec::with_capacity(1024);
        let mut chunk = [0u8; 2048];
        loop {
            let read = timeout(t, tls.read(&mut chunk))
                .await
                .map_err(|_| TransportError::Timeout("response read"))?;
            match read {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    if buf.windows(4).any(|w| w == b"\r\n\r\n") || buf.len() >= MAX_HEAD_BYTES {
                        break;
                    }
                }
                // servers often drop the connection without close_notify once the head is sent
                Err(_) if !buf.is_empty() => break,
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
        let head = ResponseHead::parse(&String::from_utf8_lossy(&buf))?;
        trace!(host = target.key(), status = head.status, "response received");

        if head.is_redirect() {
            Ok(HandshakeOutcome::RedirectEncountered {
                status: head.status,
                location: head.location,
                chain,
            })
        } else {
            Ok(HandshakeOutcome::Completed { status: head.status, chain })
        }
    }
}

fn host_header(target: &Target) -> String {
    let host = target.url().host_str().unwrap_or(target.hostname());
    if target.port() == 443 {
        host.to_string()
    } else {
        format!("{}:{}", host, target.port())
    }
}

/// Resolve and try each address in turn until one accepts.
async fn connect_any(host: &str, port: u16, t: Duration) -> Result<TcpStream, TransportError> {
    let addrs: Vec<SocketAddr> = timeout(t, tokio::net::lookup_host((host, port)))
        .await
        .map_err(|_| TransportError::Timeout("resolve"))?
        .map_err(|_| TransportError::Resolve(host.to_string()))?
        .collect();
    let mut last = TransportError::Resolve(host.to_string());
    for addr in addrs {
        match timeout(t, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(source)) => last = TransportError::Connect { addr, source },
            Err(_) => last = TransportError::Timeout("connect"),
        }
    }
    Err(last)
}

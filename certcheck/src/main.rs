use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use classify::ProbeClassifier;
use probe_state::ProbeRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tls_probe::{ProbeOptions, TlsChainFetcher};
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use trust_store::TrustStore;

mod config;
mod http;
mod monitor;

use config::{Config, Settings};
use monitor::Monitor;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat { Text, Json, Jsonl }

#[derive(Debug, Parser)]
#[command(name = "certcheck", version, about = "Periodic TLS certificate checks for HTTPS endpoints")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./certcheck.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct ProbeArgs {
    /// URL to check for certificate issues (repeatable)
    #[arg(long = "probe", value_name = "URL")]
    probes: Vec<String>,
    /// When to warn about a soon expiring certificate (default 744h)
    #[arg(long, value_name = "DURATION")]
    expire_warning: Option<String>,
    /// Directory to load additional trusted root certificates from (*.pem, *.crt)
    #[arg(long, value_name = "DIR")]
    roots_dir: Option<PathBuf>,
    /// Log verbosity: trace, debug, info, warn or error (default info)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
    /// Upper bound for a single probe (default 10s)
    #[arg(long, value_name = "DURATION")]
    timeout: Option<String>,
}

impl ProbeArgs {
    fn into_config(self) -> Config {
        Config {
            probes: self.probes,
            expire_warning: self.expire_warning,
            roots_dir: self.roots_dir,
            log_level: self.log_level,
            timeout: self.timeout,
            ..Config::default()
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Check all probes now and periodically, serving metrics and a status page
    Serve {
        #[command(flatten)]
        probe: ProbeArgs,
        /// Address for the HTTP endpoints (default 0.0.0.0:3000)
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
        /// Time between two refreshes (default 1h)
        #[arg(long, value_name = "DURATION")]
        interval: Option<String>,
    },
    /// Check all probes once and print the results; fails unless every host is OK
    Check {
        #[command(flatten)]
        probe: ProbeArgs,
        /// Output format: text, json, or jsonl
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Version => {
            println!("certcheck {} (core {})", env!("CARGO_PKG_VERSION"), certcheck_core::version());
        }
        Commands::Serve { probe, listen, interval } => {
            let mut overrides = probe.into_config();
            overrides.listen = listen;
            overrides.interval = interval;
            let settings = load_settings(cli.config.as_deref(), overrides)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(serve(settings))?;
        }
        Commands::Check { probe, format } => {
            let settings = load_settings(cli.config.as_deref(), probe.into_config())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check(settings, format))?;
        }
    }
    Ok(())
}

fn load_settings(path: Option<&Path>, overrides: Config) -> Result<Settings> {
    let file = config::load_config(path)?.unwrap_or_default();
    let settings = Settings::resolve(overrides.over(file))?;
    init_logging(settings.log_level)?;
    Ok(settings)
}

fn init_logging(level: Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("unable to install log subscriber")
}

fn build_monitor(settings: &Settings) -> Result<Monitor> {
    let trust = TrustStore::build(settings.roots_dir.as_deref())
        .context("could not load root certificates")?;
    info!(roots = trust.len(), custom = trust.custom_len(), "trust store loaded");

    let opts = ProbeOptions { timeout: settings.timeout, ..ProbeOptions::default() };
    let fetcher = TlsChainFetcher::new(opts)?;
    let classifier = ProbeClassifier::new(Arc::new(fetcher), trust, settings.expire_warning)
        .with_deadline(settings.timeout);
    Ok(Monitor::new(settings.targets.clone(), classifier))
}

async fn serve(settings: Settings) -> Result<()> {
    let monitor = Arc::new(build_monitor(&settings)?);
    if monitor.targets().is_empty() {
        warn!("no probes configured");
    }

    // first tick is immediate: probe once before the endpoints come up
    let mut ticker = monitor::ticker(settings.interval);
    ticker.tick().await;
    monitor.spawn_refresh().await.context("initial refresh failed")?;
    let schedule = monitor::spawn_schedule(monitor.clone(), ticker);

    let listener = TcpListener::bind(settings.listen)
        .await
        .with_context(|| format!("unable to listen on {}", settings.listen))?;
    info!(
        listen = %settings.listen,
        version = env!("CARGO_PKG_VERSION"),
        interval = %humantime::format_duration(settings.interval),
        "certcheck started"
    );
    let app = http::router(http::AppState { store: monitor.store() });
    let served = http::serve(listener, app).await;
    schedule.abort();
    served
}

async fn check(settings: Settings, format: OutputFormat) -> Result<()> {
    let monitor = build_monitor(&settings)?;
    monitor.refresh().await;
    let store = monitor.store();
    let snapshot = store.snapshot();

    match format {
        OutputFormat::Text => {
            for (host, record) in &snapshot {
                match record {
                    Some(r) => println!("{}", text_line(host, r)),
                    None => println!("{} not checked", host),
                }
            }
        }
        OutputFormat::Json => {
            let body: BTreeMap<&str, Option<&ProbeRecord>> =
                snapshot.iter().map(|(h, r)| (h.as_str(), r.as_deref())).collect();
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Jsonl => {
            for (host, record) in &snapshot {
                let obj = serde_json::json!({ "host": host, "result": record.as_deref() });
                println!("{}", serde_json::to_string(&obj)?);
            }
        }
    }

    if !store.all_ok() {
        let ok = snapshot
            .values()
            .filter(|r| matches!(r, Some(r) if r.kind == certcheck_core::ProbeKind::Ok))
            .count();
        bail!("{} of {} hosts are not OK", snapshot.len() - ok, snapshot.len());
    }
    Ok(())
}

fn text_line(host: &str, r: &ProbeRecord) -> String {
    let mut line = format!("{} {} {}", host, r.kind, r.description);
    if let Some(c) = &r.certificate {
        line.push_str(&format!(" (subject {}, issuer {}, expires {})", c.subject_common_name, c.issuer_common_name, c.not_after));
    }
    if let Some(d) = &r.detail {
        line.push_str(&format!(": {}", d));
    }
    line
}

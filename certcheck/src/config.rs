use anyhow::{Context, Result};
use certcheck_core::{ConfigError, Target};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

const DEFAULT_CONFIG: &str = "certcheck.yaml";
const DEFAULT_EXPIRE_WARNING: &str = "744h";
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_INTERVAL: &str = "1h";
const DEFAULT_LISTEN: &str = "0.0.0.0:3000";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Raw settings as they come from the YAML file or the command line.
/// Durations stay strings until `Settings::resolve`.
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    pub probes: Vec<String>,
    pub expire_warning: Option<String>,
    pub roots_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub timeout: Option<String>,
    pub listen: Option<String>,
    pub interval: Option<String>,
}

impl Config {
    /// Layer `self` (command line) over `base` (file). Scalars from `self`
    /// win; probes from both are kept, file entries first.
    pub fn over(self, base: Config) -> Config {
        let mut probes = base.probes;
        for p in self.probes {
            if !probes.contains(&p) {
                probes.push(p);
            }
        }
        Config {
            probes,
            expire_warning: self.expire_warning.or(base.expire_warning),
            roots_dir: self.roots_dir.or(base.roots_dir),
            log_level: self.log_level.or(base.log_level),
            timeout: self.timeout.or(base.timeout),
            listen: self.listen.or(base.listen),
            interval: self.interval.or(base.interval),
        }
    }
}

/// Load the YAML config. An explicit path must exist; without one,
/// `./certcheck.yaml` is used when present. A file that does not parse is an error.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path)
        .with_context(|| format!("unable to read config file {}", path.display()))?;
    let cfg = serde_yaml::from_str(&s)
        .with_context(|| format!("unable to parse config file {}", path.display()))?;
    Ok(Some(cfg))
}

/// Fully validated settings handed to the rest of the program.
#[derive(Debug, Clone)]
pub struct Settings {
    pub targets: Vec<Target>,
    pub expire_warning: Duration,
    pub roots_dir: Option<PathBuf>,
    pub log_level: Level,
    pub timeout: Duration,
    pub listen: SocketAddr,
    pub interval: Duration,
}

impl Settings {
    pub fn resolve(cfg: Config) -> Result<Settings> {
        let targets = parse_targets(&cfg.probes)?;
        let expire_warning =
            parse_duration(cfg.expire_warning.as_deref().unwrap_or(DEFAULT_EXPIRE_WARNING))?;
        let timeout = non_zero(parse_duration(cfg.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))?, "timeout")?;
        let interval = non_zero(parse_duration(cfg.interval.as_deref().unwrap_or(DEFAULT_INTERVAL))?, "interval")?;
        let log_level = parse_log_level(cfg.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL))?;
        let listen_raw = cfg.listen.as_deref().unwrap_or(DEFAULT_LISTEN);
        let listen = listen_raw
            .parse()
            .with_context(|| format!("invalid listen address {:?}", listen_raw))?;
        Ok(Settings {
            targets,
            expire_warning,
            roots_dir: cfg.roots_dir.filter(|p| !p.as_os_str().is_empty()),
            log_level,
            timeout,
            listen,
            interval,
        })
    }
}

fn parse_targets(probes: &[String]) -> Result<Vec<Target>, ConfigError> {
    let mut seen = HashSet::new();
    let mut targets = Vec::with_capacity(probes.len());
    for raw in probes.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        let target = Target::parse(raw)?;
        if !seen.insert(target.key().to_string()) {
            return Err(ConfigError::DuplicateTarget(target.key().to_string()));
        }
        targets.push(target);
    }
    Ok(targets)
}

pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidDuration {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn non_zero(d: Duration, what: &str) -> Result<Duration, ConfigError> {
    if d.is_zero() {
        return Err(ConfigError::InvalidDuration {
            value: "0s".into(),
            reason: format!("{} must be greater than zero", what),
        });
    }
    Ok(d)
}

pub fn parse_log_level(value: &str) -> Result<Level> {
    match value.trim().to_ascii_lowercase().as_str() {
        "warning" => Ok(Level::WARN),
        other => other
            .parse::<Level>()
            .map_err(|_| anyhow::anyhow!("unable to parse log level {:?}", value)),
    }
}

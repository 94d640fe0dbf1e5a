use std::net::SocketAddr;

use nodeprism_core::error::{PrismError, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    pub version: u32,

    #[serde(default)]
    pub web: WebSection,

    #[serde(default)]
    pub collector: CollectorSection,

    #[serde(default)]
    pub log: LogSection,

    #[serde(default)]
    pub runtime: RuntimeSection,
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PrismError::Config(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.web.validate()?;
        self.collector.validate()?;
        self.log.validate()?;
        self.runtime.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_telemetry_path")]
    pub telemetry_path: String,

    /// Leave out promhttp_*, process_* and runtime metrics about the exporter itself.
    #[serde(default)]
    pub disable_exporter_metrics: bool,

    /// Maximum number of parallel scrape requests. 0 disables the bound.
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    /// Comma-separated IPs or CIDR ranges. Empty means allow all.
    #[serde(default)]
    pub allow_ips: String,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            telemetry_path: default_telemetry_path(),
            disable_exporter_metrics: false,
            max_requests: default_max_requests(),
            allow_ips: String::new(),
        }
    }
}

impl WebSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if !self.telemetry_path.starts_with('/') {
            return Err(PrismError::Config(
                "web.telemetry_path must start with '/'".into(),
            ));
        }
        // The router would read these as captures or wildcards.
        if let Some(seg) = self
            .telemetry_path
            .split('/')
            .find(|seg| seg.contains([':', '*']))
        {
            return Err(PrismError::Config(format!(
                "web.telemetry_path segment {seg:?} must be literal"
            )));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| PrismError::Config(format!("web.listen must be a valid SocketAddr: {e}")))
    }

    /// Allow-list entries, whitespace-trimmed, empties dropped.
    pub fn allowlist(&self) -> Vec<String> {
        self.allow_ips
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn default_listen() -> String {
    "0.0.0.0:9100".into()
}
fn default_telemetry_path() -> String {
    "/metrics".into()
}
fn default_max_requests() -> usize {
    40
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectorSection {
    /// Start from an empty enabled set instead of the per-collector defaults.
    #[serde(default)]
    pub disable_defaults: bool,

    #[serde(default)]
    pub enable: Vec<String>,

    #[serde(default)]
    pub disable: Vec<String>,

    #[serde(default = "default_procfs")]
    pub procfs: String,
}

impl Default for CollectorSection {
    fn default() -> Self {
        Self {
            disable_defaults: false,
            enable: Vec::new(),
            disable: Vec::new(),
            procfs: default_procfs(),
        }
    }
}

impl CollectorSection {
    pub fn validate(&self) -> Result<()> {
        if let Some(both) = self.enable.iter().find(|n| self.disable.contains(n)) {
            return Err(PrismError::Config(format!(
                "collector {both} is both enabled and disabled"
            )));
        }
        if self.procfs.is_empty() {
            return Err(PrismError::Config("collector.procfs must not be empty".into()));
        }
        Ok(())
    }
}

fn default_procfs() -> String {
    "/proc".into()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LogSection {
    pub fn validate(&self) -> Result<()> {
        EnvFilter::try_new(&self.level)
            .map(|_| ())
            .map_err(|e| PrismError::Config(format!("log.level is not a valid filter: {e}")))
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    /// Tokio worker threads for the serving runtime.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
        }
    }
}

impl RuntimeSection {
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(PrismError::Config(
                "runtime.worker_threads must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_worker_threads() -> usize {
    1
}

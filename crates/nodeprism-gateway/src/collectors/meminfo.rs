use std::path::{Path, PathBuf};

use prometheus::proto::MetricFamily;

use nodeprism_core::error::{PrismError, Result};
use nodeprism_core::Collector;

/// Memory statistics from `<procfs>/meminfo`.
pub struct MeminfoCollector {
    path: PathBuf,
}

impl MeminfoCollector {
    pub fn new(procfs: &Path) -> Self {
        Self {
            path: procfs.join("meminfo"),
        }
    }
}

/// Parse meminfo into `(metric suffix, value)` pairs.
///
/// Values with a `kB` unit are converted to bytes. `Active(anon)` becomes
/// `Active_anon`.
pub fn parse_meminfo(data: &str) -> Result<Vec<(String, f64)>> {
    let mut out = Vec::new();
    for line in data.lines().filter(|l| !l.trim().is_empty()) {
        let (key, rest) = line
            .split_once(':')
            .ok_or_else(|| PrismError::Collector(format!("invalid meminfo line: {line:?}")))?;
        let mut parts = rest.split_whitespace();
        let raw = parts
            .next()
            .ok_or_else(|| PrismError::Collector(format!("invalid meminfo line: {line:?}")))?;
        let mut value = super::parse_f64(raw, "meminfo")?;
        let mut name = key.trim().replace('(', "_").replace(')', "");
        if parts.next() == Some("kB") {
            value *= 1024.0;
            name.push_str("_bytes");
        }
        out.push((name, value));
    }
    Ok(out)
}

impl Collector for MeminfoCollector {
    fn update(&self) -> Result<Vec<MetricFamily>> {
        let stats = parse_meminfo(&super::read_source(&self.path)?)?;
        let mut out = Vec::with_capacity(stats.len());
        for (name, value) in stats {
            out.extend(super::gauge(
                &format!("node_memory_{name}"),
                &format!("Memory information field {name}."),
                value,
            )?);
        }
        Ok(out)
    }
}

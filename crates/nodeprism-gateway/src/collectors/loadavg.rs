use std::path::{Path, PathBuf};

use prometheus::proto::MetricFamily;

use nodeprism_core::error::{PrismError, Result};
use nodeprism_core::Collector;

/// 1, 5 and 15 minute load averages from `<procfs>/loadavg`.
pub struct LoadavgCollector {
    path: PathBuf,
}

impl LoadavgCollector {
    pub fn new(procfs: &Path) -> Self {
        Self {
            path: procfs.join("loadavg"),
        }
    }
}

/// Parse the first three fields of a loadavg line.
pub fn parse_loadavg(data: &str) -> Result<[f64; 3]> {
    let mut fields = data.split_whitespace();
    let mut out = [0.0; 3];
    for slot in out.iter_mut() {
        let f = fields
            .next()
            .ok_or_else(|| PrismError::Collector(format!("unexpected loadavg content: {data:?}")))?;
        *slot = super::parse_f64(f, "loadavg")?;
    }
    Ok(out)
}

impl Collector for LoadavgCollector {
    fn update(&self) -> Result<Vec<MetricFamily>> {
        let loads = parse_loadavg(&super::read_source(&self.path)?)?;
        let mut out = Vec::with_capacity(3);
        for (window, value) in ["1", "5", "15"].iter().zip(loads) {
            out.extend(super::gauge(
                &format!("node_load{window}"),
                &format!("{window}m load average."),
                value,
            )?);
        }
        Ok(out)
    }
}

//! Built-in collectors.
//!
//! Each collector reads one source (mostly procfs) per scrape and returns
//! fresh metric families. They are registered by name into a
//! [`CollectorRegistry`] and switched on or off from config.

pub mod filefd;
pub mod loadavg;
pub mod meminfo;
pub mod time;

use std::path::PathBuf;

use prometheus::core::Collector as _;
use prometheus::proto::MetricFamily;
use prometheus::Gauge;

use nodeprism_core::error::{PrismError, Result};
use nodeprism_core::{Collector, CollectorRegistry};

use crate::config::CollectorSection;

/// Build the registry of built-in collectors and apply the enable/disable
/// settings from config.
pub fn builtin_registry(cfg: &CollectorSection) -> Result<CollectorRegistry> {
    let registry = CollectorRegistry::new();
    let procfs = PathBuf::from(&cfg.procfs);

    registry.register("time", true, || Ok(Box::new(time::TimeCollector) as Box<dyn Collector>));
    {
        let procfs = procfs.clone();
        registry.register("loadavg", true, move || {
            Ok(Box::new(loadavg::LoadavgCollector::new(&procfs)) as Box<dyn Collector>)
        });
    }
    {
        let procfs = procfs.clone();
        registry.register("meminfo", true, move || {
            Ok(Box::new(meminfo::MeminfoCollector::new(&procfs)) as Box<dyn Collector>)
        });
    }
    registry.register("filefd", false, move || {
        Ok(Box::new(filefd::FilefdCollector::new(&procfs)) as Box<dyn Collector>)
    });

    if cfg.disable_defaults {
        registry.disable_defaults();
    }
    for name in &cfg.enable {
        registry.set_enabled(name, true)?;
    }
    for name in &cfg.disable {
        registry.set_enabled(name, false)?;
    }

    Ok(registry)
}

/// Single unlabelled gauge as a metric family.
pub(crate) fn gauge(name: &str, help: &str, value: f64) -> Result<Vec<MetricFamily>> {
    let g = Gauge::new(name, help)?;
    g.set(value);
    Ok(g.collect())
}

pub(crate) fn read_source(path: &std::path::Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| PrismError::Collector(format!("read {} failed: {e}", path.display())))
}

pub(crate) fn parse_f64(field: &str, what: &str) -> Result<f64> {
    field
        .parse::<f64>()
        .map_err(|e| PrismError::Collector(format!("invalid {what} value {field:?}: {e}")))
}

use std::time::{SystemTime, UNIX_EPOCH};

use prometheus::proto::MetricFamily;

use nodeprism_core::error::{PrismError, Result};
use nodeprism_core::Collector;

/// Exposes the current system time.
pub struct TimeCollector;

impl Collector for TimeCollector {
    fn update(&self) -> Result<Vec<MetricFamily>> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| PrismError::Collector(format!("clock before epoch: {e}")))?;
        super::gauge(
            "node_time_seconds",
            "System time in seconds since epoch (1970).",
            now.as_secs_f64(),
        )
    }
}

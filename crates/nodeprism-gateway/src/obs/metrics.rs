//! Self-instrumentation registry.
//!
//! Holds the process collector (Linux), a tokio runtime collector and the
//! `promhttp_metric_handler_*` series. Built once at startup and shared by
//! `Arc`; the counters are never re-registered.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{IntCounterVec, IntGauge, Opts, Registry};
use tokio::runtime::Handle;

use nodeprism_core::error::Result;

/// Status codes pre-initialised so they show up at zero before first use.
const PRESET_CODES: [&str; 3] = ["200", "500", "503"];
const PRESET_CAUSES: [&str; 2] = ["gathering", "encoding"];

pub struct ExporterMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    requests_in_flight: IntGauge,
    errors_total: IntCounterVec,
}

impl ExporterMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;
        registry.register(Box::new(RuntimeCollector::new(Handle::try_current().ok())?))?;

        let requests_total = IntCounterVec::new(
            Opts::new(
                "promhttp_metric_handler_requests_total",
                "Total number of scrapes by HTTP status code.",
            ),
            &["code"],
        )?;
        let requests_in_flight = IntGauge::new(
            "promhttp_metric_handler_requests_in_flight",
            "Current number of scrapes being served.",
        )?;
        let errors_total = IntCounterVec::new(
            Opts::new(
                "promhttp_metric_handler_errors_total",
                "Total number of internal errors encountered by the promhttp metric handler.",
            ),
            &["cause"],
        )?;
        for code in PRESET_CODES {
            requests_total.with_label_values(&[code]);
        }
        for cause in PRESET_CAUSES {
            errors_total.with_label_values(&[cause]);
        }

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(requests_in_flight.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            requests_in_flight,
            errors_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Count a scrape as in flight until the guard drops.
    pub fn track_in_flight(&self) -> InFlightGuard<'_> {
        self.requests_in_flight.inc();
        InFlightGuard(&self.requests_in_flight)
    }

    pub fn record_request(&self, code: &str) {
        self.requests_total.with_label_values(&[code]).inc();
    }

    pub fn record_error(&self, cause: &str) {
        self.errors_total.with_label_values(&[cause]).inc();
    }
}

/// Decrements the in-flight gauge on drop, including when the client goes away.
pub struct InFlightGuard<'a>(&'a IntGauge);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Reports worker and task counts of the tokio runtime serving the exporter.
struct RuntimeCollector {
    handle: Option<Handle>,
    workers: IntGauge,
    alive_tasks: IntGauge,
    descs: Vec<Desc>,
}

impl RuntimeCollector {
    fn new(handle: Option<Handle>) -> Result<Self> {
        let workers = IntGauge::new(
            "nodeprism_runtime_workers",
            "Number of worker threads used by the runtime.",
        )?;
        let alive_tasks = IntGauge::new(
            "nodeprism_runtime_alive_tasks",
            "Number of tasks currently alive in the runtime.",
        )?;
        let descs = workers
            .desc()
            .into_iter()
            .chain(alive_tasks.desc())
            .cloned()
            .collect();
        Ok(Self {
            handle,
            workers,
            alive_tasks,
            descs,
        })
    }
}

impl Collector for RuntimeCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let Some(handle) = &self.handle else {
            return Vec::new();
        };
        let m = handle.metrics();
        self.workers.set(m.num_workers() as i64);
        self.alive_tasks.set(m.num_alive_tasks() as i64);

        let mut out = self.workers.collect();
        out.extend(self.alive_tasks.collect());
        out
    }
}

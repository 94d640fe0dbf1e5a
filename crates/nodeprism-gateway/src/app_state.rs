//! Shared application state for the nodeprism gateway.
//!
//! Everything here is built before the listener accepts connections and is
//! read-only afterwards.

use std::sync::Arc;

use nodeprism_core::error::Result;
use nodeprism_core::CollectorFactory;

use crate::collectors;
use crate::config::ExporterConfig;
use crate::ops::LandingPage;
use crate::policy::AccessControl;
use crate::scrape::{MetricsHandler, MetricsOptions};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    access: Arc<AccessControl>,
}

struct AppStateInner {
    cfg: ExporterConfig,
    metrics: MetricsHandler,
    landing: LandingPage,
}

impl AppState {
    /// Build application state with the built-in collectors.
    /// Returns Result so main can handle errors gracefully (no panic).
    pub fn new(cfg: ExporterConfig) -> Result<Self> {
        let registry = collectors::builtin_registry(&cfg.collector)?;
        Self::with_factory(cfg, Arc::new(registry))
    }

    /// Build application state around an arbitrary collector factory.
    pub fn with_factory(cfg: ExporterConfig, factory: Arc<dyn CollectorFactory>) -> Result<Self> {
        let allowlist = cfg.web.allowlist();
        if allowlist.is_empty() {
            tracing::info!("IP restriction disabled, all IPs allowed");
        } else {
            tracing::info!(allowed_ips = ?allowlist, "IP restriction enabled");
        }
        let access = Arc::new(AccessControl::new(allowlist));

        let metrics = MetricsHandler::new(
            factory,
            MetricsOptions {
                include_exporter_metrics: !cfg.web.disable_exporter_metrics,
                max_requests: cfg.web.max_requests,
            },
        )?;

        let landing = LandingPage::new(
            "Node Prism",
            "Prometheus node metrics exporter",
            env!("CARGO_PKG_VERSION"),
            &cfg.web.telemetry_path,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                metrics,
                landing,
            }),
            access,
        })
    }

    pub fn cfg(&self) -> &ExporterConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> &MetricsHandler {
        &self.inner.metrics
    }

    pub fn landing(&self) -> &LandingPage {
        &self.inner.landing
    }

    pub fn access(&self) -> Arc<AccessControl> {
        Arc::clone(&self.access)
    }
}

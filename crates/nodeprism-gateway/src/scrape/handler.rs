//! Metrics endpoint handler.
//!
//! Owns the unfiltered exposition handler built at startup and the sorted
//! snapshot of enabled collector names recorded by that same build. Filtered
//! scrapes build a fresh registry per request and drop it after responding.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use prometheus::Registry;

use nodeprism_core::error::{PrismError, Result};
use nodeprism_core::{CollectorFactory, NodeCollector};

use crate::obs::ExporterMetrics;

use super::exposition::{ExpositionHandler, InFlightLimit};
use super::filter::{FilterSpec, ScrapeFilter};
use super::version::version_collector;

#[derive(Debug, Clone, Copy)]
pub struct MetricsOptions {
    /// Serve promhttp_*, process_* and runtime metrics alongside the scrape.
    pub include_exporter_metrics: bool,
    /// Maximum parallel scrapes; 0 disables the bound.
    pub max_requests: usize,
}

/// Which collectors a build should cover.
#[derive(Clone, Copy)]
enum Selection<'a> {
    /// The one startup build: every enabled collector, names recorded.
    Startup,
    Filtered(&'a [String]),
}

struct Built {
    handler: ExpositionHandler,
    collectors: Vec<String>,
}

/// Everything needed to build an exposition handler. Holds no per-request
/// state, so concurrent builds never share a registry.
struct InnerBuilder {
    factory: Arc<dyn CollectorFactory>,
    exporter_metrics: Option<Arc<ExporterMetrics>>,
    limit: InFlightLimit,
}

impl InnerBuilder {
    fn build(&self, selection: Selection<'_>) -> Result<Built> {
        let nc = match selection {
            Selection::Startup => self.factory.build(&[])?,
            Selection::Filtered([]) => NodeCollector::new(BTreeMap::new())?,
            Selection::Filtered(filters) => self.factory.build(filters)?,
        };
        let collectors = nc.names();

        if matches!(selection, Selection::Startup) {
            tracing::info!("Enabled collectors");
            for c in &collectors {
                tracing::info!(collector = %c);
            }
        }

        let registry = Registry::new();
        registry.register(version_collector()?)?;
        registry
            .register(Box::new(nc))
            .map_err(|e| PrismError::Registration(e.to_string()))?;

        let handler = match &self.exporter_metrics {
            Some(exporter) => {
                ExpositionHandler::instrumented(registry, self.limit.clone(), Arc::clone(exporter))
            }
            None => ExpositionHandler::new(registry, self.limit.clone()),
        };
        Ok(Built {
            handler,
            collectors,
        })
    }
}

pub struct MetricsHandler {
    builder: InnerBuilder,
    unfiltered: Arc<ExpositionHandler>,
    enabled_collectors: Arc<[String]>,
}

impl MetricsHandler {
    /// Build the exporter registry (if requested) and the unfiltered handler.
    ///
    /// Runs before the listener accepts anything; an error here is a
    /// configuration error and the caller must not start serving.
    pub fn new(factory: Arc<dyn CollectorFactory>, opts: MetricsOptions) -> Result<Self> {
        let exporter_metrics = if opts.include_exporter_metrics {
            Some(Arc::new(ExporterMetrics::new()?))
        } else {
            None
        };

        let builder = InnerBuilder {
            factory,
            exporter_metrics,
            limit: InFlightLimit::new(opts.max_requests),
        };
        let Built {
            handler,
            collectors,
        } = builder
            .build(Selection::Startup)
            .map_err(|e| PrismError::Config(format!("Couldn't create metrics handler: {e}")))?;

        Ok(Self {
            builder,
            unfiltered: Arc::new(handler),
            enabled_collectors: collectors.into(),
        })
    }

    /// Sorted names recorded by the startup build.
    pub fn enabled_collectors(&self) -> &[String] {
        &self.enabled_collectors
    }

    pub async fn serve(&self, raw_query: Option<&str>) -> Response {
        let spec = FilterSpec::from_query(raw_query);
        tracing::debug!(collects = ?spec.collects, "collect query");
        tracing::debug!(excludes = ?spec.excludes, "exclude query");

        let filter = match spec.into_filter() {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!("rejecting combined collect and exclude queries");
                return (error_status(&e), e.to_string()).into_response();
            }
        };

        if filter == ScrapeFilter::Unfiltered {
            return Arc::clone(&self.unfiltered).serve().await;
        }

        let filters = filter.resolve(&self.enabled_collectors);
        match self.builder.build(Selection::Filtered(&filters)) {
            Ok(built) => Arc::new(built.handler).serve().await,
            Err(e) => {
                tracing::warn!(err = %e, "Couldn't create filtered metrics handler");
                (
                    error_status(&e),
                    format!("Couldn't create filtered metrics handler: {e}"),
                )
                    .into_response()
            }
        }
    }
}

/// 400 for bad filters, 500 for failures on our side.
fn error_status(e: &PrismError) -> StatusCode {
    if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use nodeprism_core::{Collector, CollectorRegistry};
    use prometheus::core::Collector as _;
    use prometheus::proto::MetricFamily;
    use prometheus::Gauge;

    struct Named(&'static str);

    impl Collector for Named {
        fn update(&self) -> Result<Vec<MetricFamily>> {
            let g = Gauge::new(format!("node_{}_up", self.0), "test collector")?;
            g.set(1.0);
            Ok(g.collect())
        }
    }

    /// Counts builds so tests can tell whether a registry was constructed.
    struct CountingFactory {
        inner: CollectorRegistry,
        builds: AtomicUsize,
    }

    impl CountingFactory {
        fn new() -> Self {
            let inner = CollectorRegistry::new();
            for name in ["cpu", "disk", "meminfo"] {
                inner.register(name, true, move || Ok(Box::new(Named(name)) as Box<dyn Collector>));
            }
            Self {
                inner,
                builds: AtomicUsize::new(0),
            }
        }
    }

    impl CollectorFactory for CountingFactory {
        fn build(&self, filters: &[String]) -> Result<NodeCollector> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            self.inner.build(filters)
        }
    }

    fn handler(include_exporter_metrics: bool) -> (MetricsHandler, Arc<CountingFactory>) {
        let factory = Arc::new(CountingFactory::new());
        let h = MetricsHandler::new(
            factory.clone(),
            MetricsOptions {
                include_exporter_metrics,
                max_requests: 0,
            },
        )
        .unwrap();
        (h, factory)
    }

    async fn body(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn startup_records_sorted_snapshot() {
        let (h, factory) = handler(false);
        assert_eq!(h.enabled_collectors(), ["cpu", "disk", "meminfo"]);
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unfiltered_scrape_reuses_startup_handler() {
        let (h, factory) = handler(false);
        let resp = h.serve(None).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let text = body(resp).await;
        assert!(text.contains("node_cpu_up 1"));
        assert!(text.contains("nodeprism_build_info"));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn combined_query_is_rejected_without_building() {
        let (h, factory) = handler(false);
        let resp = h.serve(Some("collect[]=cpu&exclude[]=disk")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(resp).await, "Combined collect and exclude queries are not allowed.");
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exclude_builds_the_remaining_collectors() {
        let (h, _) = handler(false);
        let text = body(h.serve(Some("exclude[]=disk")).await).await;
        assert!(text.contains("node_cpu_up 1"));
        assert!(text.contains("node_meminfo_up 1"));
        assert!(!text.contains("node_disk_up"));
    }

    #[tokio::test]
    async fn unknown_collector_is_400_and_snapshot_is_unchanged() {
        let (h, _) = handler(false);
        let resp = h.serve(Some("collect[]=nope")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body(resp).await,
            "Couldn't create filtered metrics handler: couldn't create collector: missing collector: nope"
        );
        assert_eq!(h.enabled_collectors(), ["cpu", "disk", "meminfo"]);
    }

    #[tokio::test]
    async fn excluding_everything_serves_no_node_collectors() {
        let (h, _) = handler(false);
        let text = body(h.serve(Some("exclude[]=cpu&exclude[]=disk&exclude[]=meminfo")).await).await;
        assert!(text.contains("nodeprism_build_info"));
        assert!(!text.contains("node_cpu_up"));
    }

    #[tokio::test]
    async fn concurrent_filtered_scrapes_are_isolated() {
        let (h, factory) = handler(false);
        let h = Arc::new(h);
        let a = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { body(h.serve(Some("collect[]=cpu")).await).await })
        };
        let b = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { body(h.serve(Some("collect[]=disk")).await).await })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.contains("node_cpu_up") && !a.contains("node_disk_up"));
        assert!(b.contains("node_disk_up") && !b.contains("node_cpu_up"));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 3);
        assert_eq!(h.enabled_collectors(), ["cpu", "disk", "meminfo"]);
    }

    #[tokio::test]
    async fn exporter_metrics_are_merged_in() {
        let (h, _) = handler(true);
        let text = body(h.serve(Some("collect[]=cpu")).await).await;
        assert!(text.contains("promhttp_metric_handler_requests_in_flight 1"));
        assert!(text.contains("node_cpu_up 1"));
    }

    #[tokio::test]
    async fn filtered_build_failure_on_our_side_is_500() {
        struct FailsWhenFiltered(CollectorRegistry);
        impl CollectorFactory for FailsWhenFiltered {
            fn build(&self, filters: &[String]) -> Result<NodeCollector> {
                if filters.is_empty() {
                    self.0.build(filters)
                } else {
                    Err(PrismError::Internal("descriptor clash".into()))
                }
            }
        }
        let h = MetricsHandler::new(
            Arc::new(FailsWhenFiltered(CountingFactory::new().inner)),
            MetricsOptions {
                include_exporter_metrics: false,
                max_requests: 0,
            },
        )
        .unwrap();

        let resp = h.serve(Some("collect[]=cpu")).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body(resp).await,
            "Couldn't create filtered metrics handler: internal: descriptor clash"
        );

        let resp = h.serve(Some("collect[]=cpu&exclude[]=disk")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn startup_failure_is_a_config_error() {
        struct Failing;
        impl CollectorFactory for Failing {
            fn build(&self, _: &[String]) -> Result<NodeCollector> {
                Err(PrismError::Collector("boom".into()))
            }
        }
        let err = MetricsHandler::new(
            Arc::new(Failing),
            MetricsOptions {
                include_exporter_metrics: false,
                max_requests: 0,
            },
        )
        .err()
        .unwrap();
        assert!(matches!(err, PrismError::Config(_)));
    }
}

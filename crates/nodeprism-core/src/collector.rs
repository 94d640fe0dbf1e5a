//! Named collectors and the aggregate that scrapes them.
//!
//! A [`CollectorRegistry`] holds every collector the exporter knows about
//! together with its enabled flag. Building it with a filter set yields a
//! [`NodeCollector`]: a fresh aggregate that plugs into a `prometheus`
//! registry and runs its members on every gather.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use prometheus::core::{Collector as PromCollector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};

use crate::error::{PrismError, Result};

const NAMESPACE: &str = "node";

/// A named source of one or more related metric families.
///
/// `update` is called once per scrape; an error marks only this collector as
/// failed for that scrape.
pub trait Collector: Send + Sync {
    fn update(&self) -> Result<Vec<MetricFamily>>;
}

/// Resolves a filter set into a concrete aggregate.
///
/// An empty filter set means "every enabled collector".
pub trait CollectorFactory: Send + Sync {
    fn build(&self, filters: &[String]) -> Result<NodeCollector>;
}

type Constructor = Arc<dyn Fn() -> Result<Box<dyn Collector>> + Send + Sync>;

struct Registration {
    enabled: AtomicBool,
    ctor: Constructor,
}

/// Registry of collector constructors keyed by name.
#[derive(Default)]
pub struct CollectorRegistry {
    entries: DashMap<String, Registration>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register a collector constructor. Re-registering a name replaces it.
    pub fn register<F>(&self, name: &str, default_enabled: bool, ctor: F)
    where
        F: Fn() -> Result<Box<dyn Collector>> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.to_string(),
            Registration {
                enabled: AtomicBool::new(default_enabled),
                ctor: Arc::new(ctor),
            },
        );
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| PrismError::Config(format!("unknown collector: {name}")))?;
        entry.enabled.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    /// Turn every collector off; callers re-enable the ones they want.
    pub fn disable_defaults(&self) {
        for e in self.entries.iter() {
            e.value().enabled.store(false, Ordering::Relaxed);
        }
    }

    /// Sorted names of enabled collectors.
    pub fn enabled_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().enabled.load(Ordering::Relaxed))
            .map(|e| e.key().clone())
            .collect();
        names.sort();
        names
    }

    fn validate_filters(&self, filters: &[String]) -> Result<BTreeSet<String>> {
        let mut wanted = BTreeSet::new();
        for f in filters {
            let entry = self
                .entries
                .get(f)
                .ok_or_else(|| PrismError::Collector(format!("missing collector: {f}")))?;
            if !entry.enabled.load(Ordering::Relaxed) {
                return Err(PrismError::Collector(format!("disabled collector: {f}")));
            }
            wanted.insert(f.clone());
        }
        Ok(wanted)
    }
}

impl CollectorFactory for CollectorRegistry {
    fn build(&self, filters: &[String]) -> Result<NodeCollector> {
        let wanted: BTreeSet<String> = if filters.is_empty() {
            self.enabled_names().into_iter().collect()
        } else {
            self.validate_filters(filters)?
        };

        let mut collectors = BTreeMap::new();
        for name in wanted {
            // Clone the constructor out so no map shard stays locked while it runs.
            let ctor = self
                .entries
                .get(&name)
                .map(|e| Arc::clone(&e.value().ctor))
                .ok_or_else(|| PrismError::Collector(format!("missing collector: {name}")))?;
            let c = ctor().map_err(|e| match e {
                PrismError::Collector(msg) => PrismError::Collector(format!("{name}: {msg}")),
                other => PrismError::Collector(format!("{name}: {other}")),
            })?;
            collectors.insert(name, c);
        }

        NodeCollector::new(collectors)
    }
}

/// Aggregate over a resolved set of collectors.
///
/// Implements `prometheus::core::Collector` so it can be registered like any
/// other metric. Each gather runs every member on its own scoped thread and
/// adds per-member duration/success gauges.
pub struct NodeCollector {
    collectors: BTreeMap<String, Box<dyn Collector>>,
    descs: Vec<Desc>,
}

impl NodeCollector {
    pub fn new(collectors: BTreeMap<String, Box<dyn Collector>>) -> Result<Self> {
        let descs = vec![
            Desc::new(
                format!("{NAMESPACE}_scrape_collector_duration_seconds"),
                "nodeprism: Duration of a collector scrape.".into(),
                vec!["collector".into()],
                HashMap::new(),
            )?,
            Desc::new(
                format!("{NAMESPACE}_scrape_collector_success"),
                "nodeprism: Whether a collector succeeded.".into(),
                vec!["collector".into()],
                HashMap::new(),
            )?,
        ];
        Ok(Self { collectors, descs })
    }

    /// Sorted member names.
    pub fn names(&self) -> Vec<String> {
        self.collectors.keys().cloned().collect()
    }

    fn scrape_vecs() -> prometheus::Result<(GaugeVec, GaugeVec)> {
        let duration = GaugeVec::new(
            Opts::new(
                format!("{NAMESPACE}_scrape_collector_duration_seconds"),
                "nodeprism: Duration of a collector scrape.",
            ),
            &["collector"],
        )?;
        let success = GaugeVec::new(
            Opts::new(
                format!("{NAMESPACE}_scrape_collector_success"),
                "nodeprism: Whether a collector succeeded.",
            ),
            &["collector"],
        )?;
        Ok((duration, success))
    }
}

struct Outcome<'a> {
    name: &'a str,
    elapsed: f64,
    result: Result<Vec<MetricFamily>>,
}

impl PromCollector for NodeCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let outcomes: Vec<Outcome<'_>> = std::thread::scope(|s| {
            let handles: Vec<_> = self
                .collectors
                .iter()
                .map(|(name, c)| {
                    let handle = s.spawn(move || {
                        let begin = Instant::now();
                        let result = c.update();
                        (begin.elapsed().as_secs_f64(), result)
                    });
                    (name.as_str(), handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(name, h)| match h.join() {
                    Ok((elapsed, result)) => Outcome { name, elapsed, result },
                    Err(_) => Outcome {
                        name,
                        elapsed: 0.0,
                        result: Err(PrismError::Internal("collector thread panicked".into())),
                    },
                })
                .collect()
        });

        let vecs = Self::scrape_vecs();
        let mut out = Vec::new();
        for o in outcomes {
            let ok = match o.result {
                Ok(families) => {
                    tracing::debug!(collector = %o.name, duration_seconds = o.elapsed, "collector succeeded");
                    out.extend(families);
                    true
                }
                Err(e) => {
                    tracing::error!(collector = %o.name, duration_seconds = o.elapsed, err = %e, "collector failed");
                    false
                }
            };
            if let Ok((duration, success)) = &vecs {
                duration.with_label_values(&[o.name]).set(o.elapsed);
                success.with_label_values(&[o.name]).set(if ok { 1.0 } else { 0.0 });
            }
        }

        match vecs {
            Ok((duration, success)) => {
                out.extend(duration.collect());
                out.extend(success.collect());
            }
            Err(e) => tracing::error!(err = %e, "scrape gauges unavailable"),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Gauge, Registry};

    struct Fixed(&'static str, f64);

    impl Collector for Fixed {
        fn update(&self) -> Result<Vec<MetricFamily>> {
            let g = Gauge::new(self.0, "fixed value")?;
            g.set(self.1);
            Ok(g.collect())
        }
    }

    struct Broken;

    impl Collector for Broken {
        fn update(&self) -> Result<Vec<MetricFamily>> {
            Err(PrismError::Internal("device went away".into()))
        }
    }

    fn registry() -> CollectorRegistry {
        let r = CollectorRegistry::new();
        r.register("cpu", true, || Ok(Box::new(Fixed("node_cpu_test", 1.0)) as Box<dyn Collector>));
        r.register("disk", true, || Ok(Box::new(Fixed("node_disk_test", 2.0)) as Box<dyn Collector>));
        r.register("meminfo", true, || Ok(Box::new(Fixed("node_mem_test", 3.0)) as Box<dyn Collector>));
        r.register("wifi", false, || Ok(Box::new(Fixed("node_wifi_test", 4.0)) as Box<dyn Collector>));
        r
    }

    #[test]
    fn empty_filters_build_enabled_set_sorted() {
        let nc = registry().build(&[]).unwrap();
        assert_eq!(nc.names(), vec!["cpu", "disk", "meminfo"]);
    }

    #[test]
    fn unknown_filter_is_rejected() {
        let err = registry().build(&["nope".to_string()]).err().unwrap();
        assert_eq!(err.to_string(), "couldn't create collector: missing collector: nope");
    }

    #[test]
    fn disabled_filter_is_rejected() {
        let err = registry().build(&["wifi".to_string()]).err().unwrap();
        assert!(err.to_string().contains("disabled collector: wifi"));
    }

    #[test]
    fn duplicate_filters_collapse() {
        let nc = registry()
            .build(&["disk".to_string(), "cpu".to_string(), "disk".to_string()])
            .unwrap();
        assert_eq!(nc.names(), vec!["cpu", "disk"]);
    }

    #[test]
    fn disable_defaults_then_enable_one() {
        let r = registry();
        r.disable_defaults();
        r.set_enabled("wifi", true).unwrap();
        assert_eq!(r.enabled_names(), vec!["wifi"]);
        assert!(r.set_enabled("ghost", true).is_err());
    }

    #[test]
    fn failing_constructor_surfaces_as_collector_error() {
        let r = registry();
        r.register("bad", true, || Err(PrismError::Internal("no such device".into())));
        let err = r.build(&["bad".to_string()]).err().unwrap();
        assert!(matches!(err, PrismError::Collector(_)));
        assert!(err.to_string().contains("bad: internal: no such device"));
    }

    #[test]
    fn failing_member_keeps_other_samples() {
        let mut members: BTreeMap<String, Box<dyn Collector>> = BTreeMap::new();
        members.insert("cpu".into(), Box::new(Fixed("node_cpu_test", 1.0)));
        members.insert("broken".into(), Box::new(Broken));
        let nc = NodeCollector::new(members).unwrap();

        let reg = Registry::new();
        reg.register(Box::new(nc)).unwrap();
        let families = reg.gather();

        let names: Vec<&str> = families.iter().map(|f| f.get_name()).collect();
        assert!(names.contains(&"node_cpu_test"));

        let success = families
            .iter()
            .find(|f| f.get_name() == "node_scrape_collector_success")
            .unwrap();
        let by_label: HashMap<String, f64> = success
            .get_metric()
            .iter()
            .map(|m| (m.get_label()[0].get_value().to_string(), m.get_gauge().get_value()))
            .collect();
        assert_eq!(by_label["cpu"], 1.0);
        assert_eq!(by_label["broken"], 0.0);
    }
}

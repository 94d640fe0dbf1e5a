//! Exposition handler: gather, encode, bound concurrency, instrument.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use nodeprism_core::error::{PrismError, Result};

use crate::obs::ExporterMetrics;

/// Fail-fast bound on concurrent scrapes. Cloning shares the bound.
#[derive(Clone, Debug)]
pub struct InFlightLimit {
    max: usize,
    sem: Option<Arc<Semaphore>>,
}

/// Held for the duration of one admitted scrape.
#[derive(Debug)]
pub struct Admission {
    _permit: Option<OwnedSemaphorePermit>,
}

impl InFlightLimit {
    /// `max == 0` disables the bound.
    pub fn new(max: usize) -> Self {
        Self {
            max,
            sem: (max > 0).then(|| Arc::new(Semaphore::new(max))),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// `None` when the bound is already reached; never waits.
    pub fn try_admit(&self) -> Option<Admission> {
        match &self.sem {
            None => Some(Admission { _permit: None }),
            Some(sem) => Arc::clone(sem)
                .try_acquire_owned()
                .ok()
                .map(|p| Admission { _permit: Some(p) }),
        }
    }
}

enum Gatherer {
    Target(Registry),
    Combined { exporter: Registry, target: Registry },
}

/// Serves one registry (optionally merged with the exporter's own registry)
/// in the text exposition format.
pub struct ExpositionHandler {
    gatherer: Gatherer,
    limit: InFlightLimit,
    instrumentation: Option<Arc<ExporterMetrics>>,
}

impl ExpositionHandler {
    /// Without self metrics: gather `target` alone, no instrumentation.
    pub fn new(target: Registry, limit: InFlightLimit) -> Self {
        Self {
            gatherer: Gatherer::Target(target),
            limit,
            instrumentation: None,
        }
    }

    /// With self metrics: gather the exporter registry and `target` together
    /// and count requests into the exporter registry.
    pub fn instrumented(
        target: Registry,
        limit: InFlightLimit,
        exporter: Arc<ExporterMetrics>,
    ) -> Self {
        Self {
            gatherer: Gatherer::Combined {
                exporter: exporter.registry().clone(),
                target,
            },
            limit,
            instrumentation: Some(exporter),
        }
    }

    pub async fn serve(self: Arc<Self>) -> Response {
        let Some(metrics) = self.instrumentation.clone() else {
            return self.respond().await;
        };
        let _in_flight = metrics.track_in_flight();
        let resp = self.respond().await;
        metrics.record_request(resp.status().as_str());
        resp
    }

    async fn respond(self: Arc<Self>) -> Response {
        let Some(_admission) = self.limit.try_admit() else {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                format!(
                    "Limit of concurrent requests reached ({}), try again later.",
                    self.limit.max()
                ),
            )
                .into_response();
        };

        let this = Arc::clone(&self);
        let encoded = tokio::task::spawn_blocking(move || this.encode()).await;
        match encoded {
            Ok(Ok((content_type, body))) => {
                (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
            }
            Ok(Err(e)) => {
                self.record_error("encoding");
                tracing::error!(err = %e, "error encoding metric families");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("An error has occurred while serving metrics:\n\n{e}"),
                )
                    .into_response()
            }
            Err(e) => {
                tracing::error!(err = %e, "metrics gathering task failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An error has occurred while serving metrics.",
                )
                    .into_response()
            }
        }
    }

    fn record_error(&self, cause: &str) {
        if let Some(m) = &self.instrumentation {
            m.record_error(cause);
        }
    }

    fn gather(&self) -> Vec<MetricFamily> {
        match &self.gatherer {
            Gatherer::Target(r) => r.gather(),
            Gatherer::Combined { exporter, target } => {
                let (merged, conflicts) = merge_families(exporter.gather(), target.gather());
                for name in conflicts {
                    self.record_error("gathering");
                    tracing::error!(family = %name, "metric family gathered with conflicting types, dropped duplicate");
                }
                merged
            }
        }
    }

    fn encode(&self) -> Result<(String, Bytes)> {
        let families = self.gather();
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder
            .encode(&families, &mut buf)
            .map_err(|e| PrismError::Internal(format!("encode: {e}")))?;
        Ok((encoder.format_type().to_string(), Bytes::from(buf)))
    }
}

/// Merge two gathers by family name, sorted. Same-name families of the same
/// type are concatenated; a type clash keeps the first and reports the name.
fn merge_families(
    first: Vec<MetricFamily>,
    second: Vec<MetricFamily>,
) -> (Vec<MetricFamily>, Vec<String>) {
    let mut by_name: BTreeMap<String, MetricFamily> = BTreeMap::new();
    let mut conflicts = Vec::new();
    for mut mf in first.into_iter().chain(second) {
        let name = mf.get_name().to_string();
        match by_name.get_mut(&name) {
            None => {
                by_name.insert(name, mf);
            }
            Some(existing) if existing.get_field_type() == mf.get_field_type() => {
                for m in mf.take_metric() {
                    existing.mut_metric().push(m);
                }
            }
            Some(_) => conflicts.push(name),
        }
    }
    (by_name.into_values().collect(), conflicts)
}

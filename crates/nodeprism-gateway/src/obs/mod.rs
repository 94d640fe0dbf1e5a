//! Metrics about the exporter itself.
//!
//! Kept in a registry separate from the scraped collectors so every
//! exposition handler, filtered or not, reports into the same counters.

pub mod metrics;

pub use metrics::{ExporterMetrics, InFlightGuard};

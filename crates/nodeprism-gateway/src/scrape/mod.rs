//! Scrape path: query filters, per-request registries, exposition.
//!
//! `MetricsHandler` keeps one exposition handler built at startup for
//! unfiltered scrapes. A scrape carrying `collect[]` or `exclude[]` gets a
//! brand-new registry that lives only as long as that request.

pub mod exposition;
pub mod filter;
pub mod handler;
pub mod version;

pub use exposition::{ExpositionHandler, InFlightLimit};
pub use filter::{FilterSpec, ScrapeFilter};
pub use handler::{MetricsHandler, MetricsOptions};

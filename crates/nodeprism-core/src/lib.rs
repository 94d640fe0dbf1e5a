//! nodeprism core: error surface and the collector abstraction.
//!
//! This crate defines what a collector is, how named collectors are resolved
//! into an aggregate for one scrape, and the error type shared with the
//! gateway. It carries no HTTP or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! A misbehaving collector must surface as `PrismError`, never take the
//! exporter down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod collector;
pub mod error;

pub use collector::{Collector, CollectorFactory, CollectorRegistry, NodeCollector};
/// Shared result type.
pub use error::{PrismError, Result};

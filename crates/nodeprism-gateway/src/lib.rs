//! nodeprism gateway library entry.
//!
//! This crate wires config, built-in collectors, the scrape path, the
//! access policy and the takeover-capable listener into one exporter. It is
//! consumed by the binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod collectors;
pub mod config;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod router;
pub mod scrape;
pub mod transport;

//! Access policy (IP allow-listing).
//!
//! Compiles the configured allow-list once at startup into an immutable
//! structure the middleware consults on every request.

pub mod allowlist;
pub mod ip_restrict;

pub use allowlist::AllowList;
pub use ip_restrict::{ip_restrict, AccessControl};

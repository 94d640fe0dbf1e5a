//! Transport layer (HTTP/1 over TCP).
//!
//! Owns the accept loop and the per-request extensions (peer address,
//! takeover capability) the access policy relies on.

pub mod listener;
pub mod takeover;

pub use listener::serve;
pub use takeover::{CancelTakeover, ConnectionTakeover, RemoteAddr, Takeover};

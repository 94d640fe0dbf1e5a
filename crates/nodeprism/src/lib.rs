//! Top-level facade crate for nodeprism.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use nodeprism_core::*;
}

pub mod gateway {
    pub use nodeprism_gateway::*;
}

//! Connection takeover capability.
//!
//! The listener attaches a [`Takeover`] handle to every request it serves.
//! Calling [`ConnectionTakeover::take_over`] tells the connection driver to
//! close the socket without writing another byte. Requests served by a
//! transport that attaches no handle cannot be taken over.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use nodeprism_core::error::{PrismError, Result};

/// "Can this connection be closed without writing protocol bytes?"
pub trait ConnectionTakeover: Send + Sync {
    /// One-shot: a second call fails.
    fn take_over(&self) -> Result<()>;
}

/// Request extension carrying the capability.
#[derive(Clone)]
pub struct Takeover(pub Arc<dyn ConnectionTakeover>);

/// Request extension carrying the peer address as `ip:port`.
#[derive(Debug, Clone)]
pub struct RemoteAddr(pub String);

/// Takeover backed by a token the connection driver waits on.
#[derive(Debug)]
pub struct CancelTakeover {
    token: CancellationToken,
    taken: AtomicBool,
}

impl CancelTakeover {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            taken: AtomicBool::new(false),
        }
    }
}

impl ConnectionTakeover for CancelTakeover {
    fn take_over(&self) -> Result<()> {
        if self.taken.swap(true, Ordering::AcqRel) {
            return Err(PrismError::Transport("connection already taken over".into()));
        }
        self.token.cancel();
        Ok(())
    }
}

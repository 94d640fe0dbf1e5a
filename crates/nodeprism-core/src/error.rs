//! Shared error type across nodeprism crates.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, PrismError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum PrismError {
    /// Startup configuration could not be turned into a running exporter.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A scrape asked for both `collect[]` and `exclude[]`.
    #[error("Combined collect and exclude queries are not allowed.")]
    CombinedFilters,
    /// Unknown, disabled, or failing collector.
    #[error("couldn't create collector: {0}")]
    Collector(String),
    #[error("couldn't register node collector: {0}")]
    Registration(String),
    /// The serving transport cannot do what the caller asked for.
    #[error("transport: {0}")]
    Transport(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl PrismError {
    /// True for errors caused by what the client asked for (reported as 400).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PrismError::CombinedFilters | PrismError::Collector(_)
        )
    }
}

impl From<prometheus::Error> for PrismError {
    fn from(e: prometheus::Error) -> Self {
        PrismError::Internal(format!("prometheus: {e}"))
    }
}

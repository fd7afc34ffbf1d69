// Engine error taxonomy
//
// Per-record errors are local and non-fatal: a bad record is rejected or
// degraded and ingestion continues for everything else. Only configuration
// load errors at startup are fatal (those use anyhow with context and
// surface to the operator, not to this taxonomy).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed telemetry. The record is rejected whole; nothing is
    /// partially applied.
    #[error("invalid telemetry: {0}")]
    InvalidTelemetry(String),

    /// The model has no pricing entry. Cost is omitted and the rest of the
    /// pipeline continues.
    #[error("no pricing entry for model '{0}'")]
    UnknownModel(String),

    /// Not enough history in the window to produce a signal.
    #[error("insufficient data: have {have} samples, need {need}")]
    InsufficientData { have: usize, need: usize },

    /// Degenerate statistics: the previous-half window average is zero, so
    /// relative drift is undefined. Logged as a data-quality event.
    #[error("drift undefined for model '{model}': previous window average is zero")]
    UndefinedDrift { model: String },

    /// The alert sink is unreachable. Retried with backoff, then buffered,
    /// then dropped with a warning. Never fails an ingestion call.
    #[error("notifier unavailable: {0}")]
    NotifierUnavailable(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

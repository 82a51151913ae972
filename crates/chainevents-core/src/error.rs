//! Error types for the chainevents pipeline.

use thiserror::Error;

/// Errors that can occur while ingesting chain events.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Connection to {url} failed after {attempts} attempts: {reason}")]
    Connection {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Blocks {start}..={end} appear pruned: requested {requested}, received {received}")]
    PrunedRange {
        start: u64,
        end: u64,
        requested: usize,
        received: usize,
    },

    #[error("Failed to enrich '{kind}': {reason}")]
    Enrich { kind: String, reason: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Handler error in '{handler}': {reason}")]
    Handler { handler: String, reason: String },

    #[error("Invalid listener state: expected {expected}, found {actual}")]
    InvalidState { expected: String, actual: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unsupported by chain client: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Builds an enrichment error for `kind`.
    pub fn enrich(kind: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::Enrich {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error must propagate to the embedding process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::PrunedRange { .. })
    }

    /// Returns `true` if historical data was found to be pruned.
    pub fn is_pruned(&self) -> bool {
        matches!(self, Self::PrunedRange { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

//! Transport-level errors for the JSON-RPC client.

use thiserror::Error;

use crate::rpc::JsonRpcError;

/// Errors raised while talking to an Ethereum JSON-RPC endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("RPC error: {0}")]
    Rpc(#[from] JsonRpcError),

    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns `true` if a retry may succeed.
    ///
    /// Node-side execution errors are deterministic; only transport failures
    /// and the node's own "try again" codes are retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited { .. } | Self::Timeout { .. } => true,
            // -32005: limit exceeded, -32603: internal error
            Self::Rpc(e) => matches!(e.code, -32005 | -32603),
            Self::Deserialization(_) | Self::Other(_) => false,
        }
    }
}

impl From<TransportError> for chainevents_core::Error {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Deserialization(e) => Self::Decode(e.to_string()),
            other => Self::Rpc(other.to_string()),
        }
    }
}

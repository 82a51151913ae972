//! The seam between the generic log pipeline and a contract family.

use std::fmt::Display;

use alloy_primitives::B256;
use async_trait::async_trait;
use chainevents_core::{CanonicalEvent, Network, Result};

use crate::client::RawLog;

/// Classifies and enriches the logs of one contract family.
#[async_trait]
pub trait ContractProtocol: Send + Sync + 'static {
    type Kind: Copy + Display + Send + Sync + 'static;

    fn network(&self) -> Network;

    /// Signatures of every event the protocol understands.
    fn topics(&self) -> Vec<B256>;

    /// Partial: `None` for logs the protocol does not track.
    fn classify(&self, log: &RawLog) -> Option<Self::Kind>;

    /// Decode `log` as `kind` into a canonical event at `block`. `None`
    /// drops a log the protocol decoded but does not deliver.
    async fn enrich(&self, chain: &str, block: u64, log: &RawLog, kind: Self::Kind)
        -> Result<Option<CanonicalEvent>>;
}

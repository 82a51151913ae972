//! The canonical, chain-independent event record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityRef;
use crate::payload::EventPayload;
use crate::types::Network;

/// One normalized chain event, handed to the handler chain exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Height at which the source event occurred (best approximation for
    /// events synthesized from storage).
    pub block_number: u64,
    /// Chain id of the listener that produced the event (e.g. `"edgeware"`).
    pub chain: String,
    /// Kind-tagged decoded data.
    pub data: EventPayload,
    /// Addresses that should be notified even if not otherwise subscribed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_addresses: Option<Vec<String>>,
    /// Addresses that should not be notified of their own action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_addresses: Option<Vec<String>>,
    /// Wall-clock time at which the pipeline produced the event.
    pub received_at: DateTime<Utc>,
}

impl CanonicalEvent {
    pub fn new(chain: impl Into<String>, block_number: u64, data: impl Into<EventPayload>) -> Self {
        Self {
            block_number,
            chain: chain.into(),
            data: data.into(),
            include_addresses: None,
            exclude_addresses: None,
            received_at: Utc::now(),
        }
    }

    pub fn include(mut self, addresses: Vec<String>) -> Self {
        self.include_addresses = Some(addresses);
        self
    }

    pub fn exclude(mut self, addresses: Vec<String>) -> Self {
        self.exclude_addresses = Some(addresses);
        self
    }

    pub fn network(&self) -> Network {
        self.data.network()
    }

    pub fn kind(&self) -> &'static str {
        self.data.kind()
    }

    pub fn entity(&self) -> Option<EntityRef> {
        self.data.entity()
    }
}

/// Sorts events ascending by block number, keeping the relative order of
/// events that share a block.
pub fn sort_by_block(events: &mut [CanonicalEvent]) {
    events.sort_by_key(|e| e.block_number);
}

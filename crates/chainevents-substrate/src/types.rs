//! Chain-native data as the runtime client hands it over.
//!
//! Event and extrinsic arguments stay loosely typed (`serde_json::Value`) so
//! that one client can serve runtimes with different type registries; the
//! enricher decodes them per kind.

use chainevents_core::payload::substrate::PreimageCall;
use chainevents_core::RawItem;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Blocks ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
}

/// Runtime spec identity; event shapes differ between versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeVersion {
    pub spec_name: String,
    pub spec_version: u32,
}

/// One `section.method` event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub section: String,
    pub method: String,
    /// Positional arguments.
    pub data: Vec<Value>,
    /// Runtime type name of each argument (e.g. `"Balance"`, `"AccountId"`).
    #[serde(default)]
    pub type_names: Vec<String>,
}

/// One signed extrinsic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExtrinsic {
    pub section: String,
    pub method: String,
    pub signer: String,
    pub args: Vec<Value>,
    /// `true` if the extrinsic dispatched without error.
    pub success: bool,
}

/// A block with its decoded events and extrinsics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub version: RuntimeVersion,
    #[serde(default)]
    pub events: Vec<RawEvent>,
    #[serde(default)]
    pub extrinsics: Vec<RawExtrinsic>,
}

impl RawItem for Block {
    fn block_number(&self) -> u64 {
        self.header.number
    }
}

// ─── Storage records ──────────────────────────────────────────────────────────

/// An entry of `democracy.publicProps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicProposal {
    pub index: u32,
    pub hash: String,
    pub proposer: String,
}

/// An ongoing referendum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferendumStatus {
    pub index: u32,
    pub proposal_hash: String,
    pub threshold: String,
    pub end: u64,
}

/// A passed referendum waiting in the dispatch queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchEntry {
    pub index: u32,
    /// Block at which the proposal will be enacted.
    pub at: u64,
    pub proposal_hash: String,
}

/// A noted preimage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preimage {
    /// Block at which the preimage was noted.
    pub at: u64,
    pub proposer: String,
    pub call: PreimageCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryProposalInfo {
    pub proposer: String,
    pub value: String,
    pub beneficiary: String,
    pub bond: String,
}

/// An open tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTip {
    /// Reason text looked up from the reason hash, hex-encoded.
    pub reason: String,
    pub who: String,
    pub finder: String,
    pub deposit: String,
    pub closes: Option<u64>,
    /// `(tipper, amount)` pairs.
    pub tips: Vec<(String, String)>,
    pub finders_fee: bool,
}

/// An identity registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Raw display name, if set as raw data.
    pub display: Option<String>,
    /// `(registrar index, judgement name)` pairs.
    pub judgements: Vec<(u32, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_deserializes_with_defaults() {
        let block: Block = serde_json::from_str(
            r#"{
                "header": {"number": 7, "hash": "0x07", "parent_hash": "0x06"},
                "version": {"spec_name": "edgeware", "spec_version": 36}
            }"#,
        )
        .unwrap();
        assert_eq!(block.block_number(), 7);
        assert!(block.events.is_empty());
        assert!(block.extrinsics.is_empty());
    }
}

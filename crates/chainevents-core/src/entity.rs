//! Governance entities and the lifecycle step each event represents.

use serde::{Deserialize, Serialize};

use crate::event::CanonicalEvent;
use crate::types::Network;

/// A long-lived on-chain object that several events refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    DemocracyProposal,
    DemocracyReferendum,
    DemocracyPreimage,
    TreasuryProposal,
    TipProposal,
    CompoundProposal,
    AaveProposal,
    MolochProposal,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DemocracyProposal => "democracy-proposal",
            Self::DemocracyReferendum => "democracy-referendum",
            Self::DemocracyPreimage => "democracy-preimage",
            Self::TreasuryProposal => "treasury-proposal",
            Self::TipProposal => "tip-proposal",
            Self::CompoundProposal => "compound-proposal",
            Self::AaveProposal => "aave-proposal",
            Self::MolochProposal => "moloch-proposal",
        }
    }

    pub fn network(&self) -> Network {
        match self {
            Self::DemocracyProposal
            | Self::DemocracyReferendum
            | Self::DemocracyPreimage
            | Self::TreasuryProposal
            | Self::TipProposal => Network::Substrate,
            Self::CompoundProposal => Network::Compound,
            Self::AaveProposal => Network::Aave,
            Self::MolochProposal => Network::Moloch,
        }
    }

    /// Name of the persisted field that stores this entity's id downstream.
    pub fn id_field(&self) -> &'static str {
        match self {
            Self::DemocracyProposal | Self::TreasuryProposal => "proposal_index",
            Self::DemocracyReferendum => "referendum_index",
            Self::DemocracyPreimage | Self::TipProposal => "proposal_hash",
            Self::CompoundProposal | Self::AaveProposal => "id",
            Self::MolochProposal => "proposal_index",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| crate::error::Error::Config(format!("unknown entity kind '{s}'")))
    }
}

/// Which lifecycle step of an entity an event represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityEventKind {
    Create,
    Update,
    Vote,
    Complete,
}

/// Points an event at its entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub event: EntityEventKind,
    pub id: String,
}

/// Returns `true` if any of `events` completes its entity.
pub fn is_entity_completed(events: &[CanonicalEvent]) -> bool {
    events
        .iter()
        .filter_map(CanonicalEvent::entity)
        .any(|e| e.event == EntityEventKind::Complete)
}

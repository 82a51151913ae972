//! Kind-tagged payloads, one closed enum per network.
//!
//! Every enum is internally tagged by `kind`; the outer [`EventPayload`] is
//! adjacently tagged by `network`, so a serialized payload reads
//! `{"network": "substrate", "event": {"kind": "balance-transfer", …}}`.

pub mod aave;
pub mod compound;
pub mod erc20;
pub mod erc721;
pub mod moloch;
pub mod substrate;

use serde::{Deserialize, Serialize};

use crate::entity::EntityRef;
use crate::types::Network;

pub use aave::{AaveEvent, AaveKind};
pub use compound::{CompoundEvent, CompoundKind};
pub use erc20::{Erc20Event, Erc20Kind};
pub use erc721::{Erc721Event, Erc721Kind};
pub use moloch::{MolochEvent, MolochKind};
pub use substrate::{SubstrateEvent, SubstrateKind};

/// Decoded event data from any supported network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "network", content = "event", rename_all = "kebab-case")]
pub enum EventPayload {
    Substrate(SubstrateEvent),
    Compound(CompoundEvent),
    Aave(AaveEvent),
    Moloch(MolochEvent),
    Erc20(Erc20Event),
    Erc721(Erc721Event),
}

impl EventPayload {
    pub fn network(&self) -> Network {
        match self {
            Self::Substrate(_) => Network::Substrate,
            Self::Compound(_) => Network::Compound,
            Self::Aave(_) => Network::Aave,
            Self::Moloch(_) => Network::Moloch,
            Self::Erc20(_) => Network::Erc20,
            Self::Erc721(_) => Network::Erc721,
        }
    }

    /// The kebab-case `kind` tag of the inner payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Substrate(e) => e.kind().as_str(),
            Self::Compound(e) => e.kind().as_str(),
            Self::Aave(e) => e.kind().as_str(),
            Self::Moloch(e) => e.kind().as_str(),
            Self::Erc20(e) => e.kind().as_str(),
            Self::Erc721(e) => e.kind().as_str(),
        }
    }

    pub fn entity(&self) -> Option<EntityRef> {
        match self {
            Self::Substrate(e) => e.entity(),
            Self::Compound(e) => e.entity(),
            Self::Aave(e) => e.entity(),
            Self::Moloch(e) => e.entity(),
            Self::Erc20(_) | Self::Erc721(_) => None,
        }
    }
}

impl From<SubstrateEvent> for EventPayload {
    fn from(e: SubstrateEvent) -> Self {
        Self::Substrate(e)
    }
}

impl From<CompoundEvent> for EventPayload {
    fn from(e: CompoundEvent) -> Self {
        Self::Compound(e)
    }
}

impl From<AaveEvent> for EventPayload {
    fn from(e: AaveEvent) -> Self {
        Self::Aave(e)
    }
}

impl From<MolochEvent> for EventPayload {
    fn from(e: MolochEvent) -> Self {
        Self::Moloch(e)
    }
}

impl From<Erc20Event> for EventPayload {
    fn from(e: Erc20Event) -> Self {
        Self::Erc20(e)
    }
}

impl From<Erc721Event> for EventPayload {
    fn from(e: Erc721Event) -> Self {
        Self::Erc721(e)
    }
}

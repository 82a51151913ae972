//! Payloads emitted by Compound-style governor contracts.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityEventKind, EntityKind, EntityRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompoundKind {
    ProposalCreated,
    ProposalCanceled,
    ProposalQueued,
    ProposalExecuted,
    VoteCast,
}

impl CompoundKind {
    pub const ALL: [CompoundKind; 5] = [
        Self::ProposalCreated,
        Self::ProposalCanceled,
        Self::ProposalQueued,
        Self::ProposalExecuted,
        Self::VoteCast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProposalCreated => "proposal-created",
            Self::ProposalCanceled => "proposal-canceled",
            Self::ProposalQueued => "proposal-queued",
            Self::ProposalExecuted => "proposal-executed",
            Self::VoteCast => "vote-cast",
        }
    }
}

impl std::fmt::Display for CompoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded governor event.
///
/// Proposal ids and vote weights are decimal strings; `support` follows the
/// Bravo encoding (0 = against, 1 = for, 2 = abstain) and Alpha's boolean
/// vote is mapped onto 0/1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CompoundEvent {
    ProposalCreated {
        id: String,
        proposer: String,
        targets: Vec<String>,
        values: Vec<String>,
        signatures: Vec<String>,
        calldatas: Vec<String>,
        start_block: u64,
        end_block: u64,
        description: String,
    },
    ProposalCanceled {
        id: String,
    },
    ProposalQueued {
        id: String,
        eta: u64,
    },
    ProposalExecuted {
        id: String,
    },
    VoteCast {
        id: String,
        voter: String,
        support: u8,
        votes: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl CompoundEvent {
    pub fn kind(&self) -> CompoundKind {
        match self {
            Self::ProposalCreated { .. } => CompoundKind::ProposalCreated,
            Self::ProposalCanceled { .. } => CompoundKind::ProposalCanceled,
            Self::ProposalQueued { .. } => CompoundKind::ProposalQueued,
            Self::ProposalExecuted { .. } => CompoundKind::ProposalExecuted,
            Self::VoteCast { .. } => CompoundKind::VoteCast,
        }
    }

    /// The proposal id every governor event refers to.
    pub fn proposal_id(&self) -> &str {
        match self {
            Self::ProposalCreated { id, .. }
            | Self::ProposalCanceled { id }
            | Self::ProposalQueued { id, .. }
            | Self::ProposalExecuted { id }
            | Self::VoteCast { id, .. } => id,
        }
    }

    pub fn entity(&self) -> Option<EntityRef> {
        let event = match self {
            Self::ProposalCreated { .. } => EntityEventKind::Create,
            Self::VoteCast { .. } => EntityEventKind::Vote,
            Self::ProposalQueued { .. } => EntityEventKind::Update,
            Self::ProposalCanceled { .. } | Self::ProposalExecuted { .. } => {
                EntityEventKind::Complete
            }
        };
        Some(EntityRef {
            kind: EntityKind::CompoundProposal,
            event,
            id: self.proposal_id().to_string(),
        })
    }
}

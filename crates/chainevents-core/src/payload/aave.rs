//! Payloads emitted by Aave governance v2 and the Aave governance token.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityEventKind, EntityKind, EntityRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AaveKind {
    ProposalCreated,
    ProposalCanceled,
    ProposalQueued,
    ProposalExecuted,
    VoteEmitted,
    DelegateChanged,
    DelegatedPowerChanged,
    Transfer,
    Approval,
}

impl AaveKind {
    pub const ALL: [AaveKind; 9] = [
        Self::ProposalCreated,
        Self::ProposalCanceled,
        Self::ProposalQueued,
        Self::ProposalExecuted,
        Self::VoteEmitted,
        Self::DelegateChanged,
        Self::DelegatedPowerChanged,
        Self::Transfer,
        Self::Approval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProposalCreated => "proposal-created",
            Self::ProposalCanceled => "proposal-canceled",
            Self::ProposalQueued => "proposal-queued",
            Self::ProposalExecuted => "proposal-executed",
            Self::VoteEmitted => "vote-emitted",
            Self::DelegateChanged => "delegate-changed",
            Self::DelegatedPowerChanged => "delegated-power-changed",
            Self::Transfer => "transfer",
            Self::Approval => "approval",
        }
    }
}

impl std::fmt::Display for AaveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AaveEvent {
    ProposalCreated {
        id: u64,
        proposer: String,
        executor: String,
        targets: Vec<String>,
        values: Vec<String>,
        signatures: Vec<String>,
        calldatas: Vec<String>,
        with_delegatecalls: Vec<bool>,
        start_block: u64,
        end_block: u64,
        strategy: String,
        ipfs_hash: String,
    },
    ProposalCanceled {
        id: u64,
    },
    ProposalQueued {
        id: u64,
        execution_time: u64,
    },
    ProposalExecuted {
        id: u64,
    },
    VoteEmitted {
        id: u64,
        voter: String,
        support: bool,
        voting_power: String,
    },
    DelegateChanged {
        token_address: String,
        delegator: String,
        delegatee: String,
        delegation_type: u8,
    },
    DelegatedPowerChanged {
        token_address: String,
        who: String,
        amount: String,
        delegation_type: u8,
    },
    Transfer {
        token_address: String,
        from: String,
        to: String,
        amount: String,
    },
    Approval {
        token_address: String,
        owner: String,
        spender: String,
        amount: String,
    },
}

impl AaveEvent {
    pub fn kind(&self) -> AaveKind {
        match self {
            Self::ProposalCreated { .. } => AaveKind::ProposalCreated,
            Self::ProposalCanceled { .. } => AaveKind::ProposalCanceled,
            Self::ProposalQueued { .. } => AaveKind::ProposalQueued,
            Self::ProposalExecuted { .. } => AaveKind::ProposalExecuted,
            Self::VoteEmitted { .. } => AaveKind::VoteEmitted,
            Self::DelegateChanged { .. } => AaveKind::DelegateChanged,
            Self::DelegatedPowerChanged { .. } => AaveKind::DelegatedPowerChanged,
            Self::Transfer { .. } => AaveKind::Transfer,
            Self::Approval { .. } => AaveKind::Approval,
        }
    }

    pub fn entity(&self) -> Option<EntityRef> {
        let (event, id) = match self {
            Self::ProposalCreated { id, .. } => (EntityEventKind::Create, *id),
            Self::VoteEmitted { id, .. } => (EntityEventKind::Vote, *id),
            Self::ProposalQueued { id, .. } => (EntityEventKind::Update, *id),
            Self::ProposalCanceled { id } | Self::ProposalExecuted { id } => {
                (EntityEventKind::Complete, *id)
            }
            Self::DelegateChanged { .. }
            | Self::DelegatedPowerChanged { .. }
            | Self::Transfer { .. }
            | Self::Approval { .. } => return None,
        };
        Some(EntityRef {
            kind: EntityKind::AaveProposal,
            event,
            id: id.to_string(),
        })
    }
}

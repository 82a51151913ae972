//! Payloads emitted by Moloch v1 DAOs.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityEventKind, EntityKind, EntityRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MolochKind {
    SubmitProposal,
    SubmitVote,
    ProcessProposal,
    Ragequit,
    Abort,
    UpdateDelegateKey,
    SummonComplete,
}

impl MolochKind {
    pub const ALL: [MolochKind; 7] = [
        Self::SubmitProposal,
        Self::SubmitVote,
        Self::ProcessProposal,
        Self::Ragequit,
        Self::Abort,
        Self::UpdateDelegateKey,
        Self::SummonComplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmitProposal => "submit-proposal",
            Self::SubmitVote => "submit-vote",
            Self::ProcessProposal => "process-proposal",
            Self::Ragequit => "ragequit",
            Self::Abort => "abort",
            Self::UpdateDelegateKey => "update-delegate-key",
            Self::SummonComplete => "summon-complete",
        }
    }
}

impl std::fmt::Display for MolochKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MolochEvent {
    SubmitProposal {
        proposal_index: u64,
        delegate_key: String,
        member: String,
        applicant: String,
        token_tribute: String,
        shares_requested: String,
        details: String,
        /// Unix seconds at which voting opens.
        start_time: u64,
    },
    SubmitVote {
        proposal_index: u64,
        delegate_key: String,
        member: String,
        vote: u8,
        shares: String,
        highest_index_yes_vote: u64,
    },
    ProcessProposal {
        proposal_index: u64,
        applicant: String,
        member: String,
        token_tribute: String,
        shares_requested: String,
        did_pass: bool,
        yes_votes: String,
        no_votes: String,
    },
    Ragequit {
        member: String,
        shares_to_burn: String,
    },
    Abort {
        proposal_index: u64,
        applicant: String,
    },
    UpdateDelegateKey {
        member: String,
        new_delegate_key: String,
    },
    SummonComplete {
        summoner: String,
        shares: String,
        start_time: u64,
    },
}

impl MolochEvent {
    pub fn kind(&self) -> MolochKind {
        match self {
            Self::SubmitProposal { .. } => MolochKind::SubmitProposal,
            Self::SubmitVote { .. } => MolochKind::SubmitVote,
            Self::ProcessProposal { .. } => MolochKind::ProcessProposal,
            Self::Ragequit { .. } => MolochKind::Ragequit,
            Self::Abort { .. } => MolochKind::Abort,
            Self::UpdateDelegateKey { .. } => MolochKind::UpdateDelegateKey,
            Self::SummonComplete { .. } => MolochKind::SummonComplete,
        }
    }

    pub fn entity(&self) -> Option<EntityRef> {
        let (event, index) = match self {
            Self::SubmitProposal { proposal_index, .. } => (EntityEventKind::Create, proposal_index),
            Self::SubmitVote { proposal_index, .. } => (EntityEventKind::Vote, proposal_index),
            Self::ProcessProposal { proposal_index, .. } | Self::Abort { proposal_index, .. } => {
                (EntityEventKind::Complete, proposal_index)
            }
            Self::Ragequit { .. } | Self::UpdateDelegateKey { .. } | Self::SummonComplete { .. } => {
                return None
            }
        };
        Some(EntityRef {
            kind: EntityKind::MolochProposal,
            event,
            id: index.to_string(),
        })
    }
}

//! Payloads emitted by the runtime-events chain.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityEventKind, EntityKind, EntityRef};

/// Canonical kinds for the runtime-events chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubstrateKind {
    Slash,
    Reward,
    Bonded,
    Unbonded,
    BalanceTransfer,
    StakingElection,
    VoteDelegated,
    DemocracyProposed,
    DemocracySeconded,
    DemocracyTabled,
    DemocracyStarted,
    DemocracyVoted,
    DemocracyPassed,
    DemocracyNotPassed,
    DemocracyCancelled,
    DemocracyExecuted,
    PreimageNoted,
    PreimageUsed,
    PreimageInvalid,
    PreimageMissing,
    PreimageReaped,
    TreasuryProposed,
    TreasuryAwarded,
    TreasuryRejected,
    NewTip,
    TipVoted,
    TipClosing,
    TipClosed,
    TipRetracted,
    TipSlashed,
    ElectionNewTerm,
    ElectionEmptyTerm,
    ElectionCandidacySubmitted,
    ElectionMemberKicked,
    ElectionMemberRenounced,
    TreasuryRewardMinting,
    TreasuryRewardMintingV2,
    IdentitySet,
    IdentityCleared,
    IdentityKilled,
    NewSession,
    AllGood,
    HeartbeatReceived,
    SomeOffline,
    #[serde(rename = "offences-offence")]
    Offence,
}

impl SubstrateKind {
    /// Every kind, in declaration order.
    pub const ALL: [SubstrateKind; 45] = [
        Self::Slash,
        Self::Reward,
        Self::Bonded,
        Self::Unbonded,
        Self::BalanceTransfer,
        Self::StakingElection,
        Self::VoteDelegated,
        Self::DemocracyProposed,
        Self::DemocracySeconded,
        Self::DemocracyTabled,
        Self::DemocracyStarted,
        Self::DemocracyVoted,
        Self::DemocracyPassed,
        Self::DemocracyNotPassed,
        Self::DemocracyCancelled,
        Self::DemocracyExecuted,
        Self::PreimageNoted,
        Self::PreimageUsed,
        Self::PreimageInvalid,
        Self::PreimageMissing,
        Self::PreimageReaped,
        Self::TreasuryProposed,
        Self::TreasuryAwarded,
        Self::TreasuryRejected,
        Self::NewTip,
        Self::TipVoted,
        Self::TipClosing,
        Self::TipClosed,
        Self::TipRetracted,
        Self::TipSlashed,
        Self::ElectionNewTerm,
        Self::ElectionEmptyTerm,
        Self::ElectionCandidacySubmitted,
        Self::ElectionMemberKicked,
        Self::ElectionMemberRenounced,
        Self::TreasuryRewardMinting,
        Self::TreasuryRewardMintingV2,
        Self::IdentitySet,
        Self::IdentityCleared,
        Self::IdentityKilled,
        Self::NewSession,
        Self::AllGood,
        Self::HeartbeatReceived,
        Self::SomeOffline,
        Self::Offence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slash => "slash",
            Self::Reward => "reward",
            Self::Bonded => "bonded",
            Self::Unbonded => "unbonded",
            Self::BalanceTransfer => "balance-transfer",
            Self::StakingElection => "staking-election",
            Self::VoteDelegated => "vote-delegated",
            Self::DemocracyProposed => "democracy-proposed",
            Self::DemocracySeconded => "democracy-seconded",
            Self::DemocracyTabled => "democracy-tabled",
            Self::DemocracyStarted => "democracy-started",
            Self::DemocracyVoted => "democracy-voted",
            Self::DemocracyPassed => "democracy-passed",
            Self::DemocracyNotPassed => "democracy-not-passed",
            Self::DemocracyCancelled => "democracy-cancelled",
            Self::DemocracyExecuted => "democracy-executed",
            Self::PreimageNoted => "preimage-noted",
            Self::PreimageUsed => "preimage-used",
            Self::PreimageInvalid => "preimage-invalid",
            Self::PreimageMissing => "preimage-missing",
            Self::PreimageReaped => "preimage-reaped",
            Self::TreasuryProposed => "treasury-proposed",
            Self::TreasuryAwarded => "treasury-awarded",
            Self::TreasuryRejected => "treasury-rejected",
            Self::NewTip => "new-tip",
            Self::TipVoted => "tip-voted",
            Self::TipClosing => "tip-closing",
            Self::TipClosed => "tip-closed",
            Self::TipRetracted => "tip-retracted",
            Self::TipSlashed => "tip-slashed",
            Self::ElectionNewTerm => "election-new-term",
            Self::ElectionEmptyTerm => "election-empty-term",
            Self::ElectionCandidacySubmitted => "election-candidacy-submitted",
            Self::ElectionMemberKicked => "election-member-kicked",
            Self::ElectionMemberRenounced => "election-member-renounced",
            Self::TreasuryRewardMinting => "treasury-reward-minting",
            Self::TreasuryRewardMintingV2 => "treasury-reward-minting-v2",
            Self::IdentitySet => "identity-set",
            Self::IdentityCleared => "identity-cleared",
            Self::IdentityKilled => "identity-killed",
            Self::NewSession => "new-session",
            Self::AllGood => "all-good",
            Self::HeartbeatReceived => "heartbeat-received",
            Self::SomeOffline => "some-offline",
            Self::Offence => "offences-offence",
        }
    }

    /// Kinds that are decoded from signed extrinsics rather than event records.
    pub fn is_extrinsic(&self) -> bool {
        matches!(
            self,
            Self::DemocracySeconded
                | Self::DemocracyVoted
                | Self::TipVoted
                | Self::ElectionCandidacySubmitted
        )
    }
}

impl std::fmt::Display for SubstrateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Supporting structures ────────────────────────────────────────────────────

/// Registrar judgement attached to an on-chain identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityJudgement {
    Unknown,
    FeePaid,
    Reasonable,
    KnownGood,
    OutOfDate,
    LowQuality,
    Erroneous,
}

impl IdentityJudgement {
    /// Parses the runtime's judgement name (`"KnownGood"`, `"FeePaid"`, …).
    pub fn from_runtime(name: &str) -> Self {
        match name {
            "FeePaid" => Self::FeePaid,
            "Reasonable" => Self::Reasonable,
            "KnownGood" => Self::KnownGood,
            "OutOfDate" => Self::OutOfDate,
            "LowQuality" => Self::LowQuality,
            "Erroneous" => Self::Erroneous,
            _ => Self::Unknown,
        }
    }
}

/// One nominator's stake behind a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndividualExposure {
    pub who: String,
    pub value: String,
}

/// A validator's total backing for the current era.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exposure {
    pub own: String,
    pub total: String,
    pub others: Vec<IndividualExposure>,
}

/// Per-validator session information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    /// Commission in parts per billion.
    pub commission_perbill: u32,
    pub controller: String,
    pub reward_destination: String,
    pub era_points: u32,
}

/// The call a preimage hash resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreimageCall {
    pub section: String,
    pub method: String,
    pub args: Vec<String>,
}

// ─── SubstrateEvent ───────────────────────────────────────────────────────────

/// Decoded payload for every runtime-events chain kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SubstrateEvent {
    Slash {
        validator: String,
        amount: String,
    },
    Reward {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        validator: Option<String>,
        amount: String,
    },
    Bonded {
        stash: String,
        amount: String,
        controller: String,
    },
    Unbonded {
        stash: String,
        amount: String,
        controller: String,
    },
    BalanceTransfer {
        sender: String,
        dest: String,
        value: String,
    },
    StakingElection {
        era: u32,
        validators: Vec<String>,
    },
    VoteDelegated {
        who: String,
        target: String,
    },
    DemocracyProposed {
        proposal_index: u32,
        proposal_hash: String,
        deposit: String,
        proposer: String,
    },
    DemocracySeconded {
        proposal_index: u32,
        who: String,
    },
    DemocracyTabled {
        proposal_index: u32,
    },
    DemocracyStarted {
        referendum_index: u32,
        proposal_hash: String,
        vote_threshold: String,
        end_block: u64,
    },
    DemocracyVoted {
        referendum_index: u32,
        who: String,
        is_aye: bool,
        conviction: u8,
        balance: String,
    },
    DemocracyPassed {
        referendum_index: u32,
        dispatch_block: Option<u64>,
    },
    DemocracyNotPassed {
        referendum_index: u32,
    },
    DemocracyCancelled {
        referendum_index: u32,
    },
    DemocracyExecuted {
        referendum_index: u32,
        execution_ok: bool,
    },
    PreimageNoted {
        proposal_hash: String,
        noter: String,
        preimage: PreimageCall,
    },
    PreimageUsed {
        proposal_hash: String,
        noter: String,
    },
    PreimageInvalid {
        proposal_hash: String,
        referendum_index: u32,
    },
    PreimageMissing {
        proposal_hash: String,
        referendum_index: u32,
    },
    PreimageReaped {
        proposal_hash: String,
        noter: String,
        reaper: String,
    },
    TreasuryProposed {
        proposal_index: u32,
        proposer: String,
        value: String,
        beneficiary: String,
        bond: String,
    },
    TreasuryAwarded {
        proposal_index: u32,
        value: String,
        beneficiary: String,
    },
    TreasuryRejected {
        proposal_index: u32,
    },
    NewTip {
        proposal_hash: String,
        reason: String,
        who: String,
        finder: String,
        deposit: String,
        finders_fee: bool,
    },
    TipVoted {
        proposal_hash: String,
        who: String,
        value: String,
    },
    TipClosing {
        proposal_hash: String,
        closing: u64,
    },
    TipClosed {
        proposal_hash: String,
        who: String,
        payout: String,
    },
    TipRetracted {
        proposal_hash: String,
    },
    TipSlashed {
        proposal_hash: String,
        finder: String,
        deposit: String,
    },
    ElectionNewTerm {
        round: u32,
        new_members: Vec<String>,
        all_members: Vec<String>,
    },
    ElectionEmptyTerm {
        round: u32,
        members: Vec<String>,
    },
    ElectionCandidacySubmitted {
        round: u32,
        candidate: String,
    },
    ElectionMemberKicked {
        who: String,
    },
    ElectionMemberRenounced {
        who: String,
    },
    TreasuryRewardMinting {
        pot: String,
        reward: String,
    },
    TreasuryRewardMintingV2 {
        pot: String,
        pot_address: String,
    },
    IdentitySet {
        who: String,
        display_name: String,
        judgements: Vec<(String, IdentityJudgement)>,
    },
    IdentityCleared {
        who: String,
    },
    IdentityKilled {
        who: String,
    },
    NewSession {
        active_exposures: BTreeMap<String, Exposure>,
        active: Vec<String>,
        waiting: Vec<String>,
        session_index: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_era: Option<u32>,
        validator_info: BTreeMap<String, ValidatorInfo>,
    },
    AllGood {
        session_index: u32,
        validators: Vec<String>,
    },
    HeartbeatReceived {
        authority_id: String,
    },
    SomeOffline {
        session_index: u32,
        validators: Vec<String>,
    },
    #[serde(rename = "offences-offence")]
    Offence {
        offence_kind: String,
        opaque_time_slot: String,
        applied: bool,
        offenders: Vec<String>,
    },
}

impl SubstrateEvent {
    pub fn kind(&self) -> SubstrateKind {
        use SubstrateKind as K;
        match self {
            Self::Slash { .. } => K::Slash,
            Self::Reward { .. } => K::Reward,
            Self::Bonded { .. } => K::Bonded,
            Self::Unbonded { .. } => K::Unbonded,
            Self::BalanceTransfer { .. } => K::BalanceTransfer,
            Self::StakingElection { .. } => K::StakingElection,
            Self::VoteDelegated { .. } => K::VoteDelegated,
            Self::DemocracyProposed { .. } => K::DemocracyProposed,
            Self::DemocracySeconded { .. } => K::DemocracySeconded,
            Self::DemocracyTabled { .. } => K::DemocracyTabled,
            Self::DemocracyStarted { .. } => K::DemocracyStarted,
            Self::DemocracyVoted { .. } => K::DemocracyVoted,
            Self::DemocracyPassed { .. } => K::DemocracyPassed,
            Self::DemocracyNotPassed { .. } => K::DemocracyNotPassed,
            Self::DemocracyCancelled { .. } => K::DemocracyCancelled,
            Self::DemocracyExecuted { .. } => K::DemocracyExecuted,
            Self::PreimageNoted { .. } => K::PreimageNoted,
            Self::PreimageUsed { .. } => K::PreimageUsed,
            Self::PreimageInvalid { .. } => K::PreimageInvalid,
            Self::PreimageMissing { .. } => K::PreimageMissing,
            Self::PreimageReaped { .. } => K::PreimageReaped,
            Self::TreasuryProposed { .. } => K::TreasuryProposed,
            Self::TreasuryAwarded { .. } => K::TreasuryAwarded,
            Self::TreasuryRejected { .. } => K::TreasuryRejected,
            Self::NewTip { .. } => K::NewTip,
            Self::TipVoted { .. } => K::TipVoted,
            Self::TipClosing { .. } => K::TipClosing,
            Self::TipClosed { .. } => K::TipClosed,
            Self::TipRetracted { .. } => K::TipRetracted,
            Self::TipSlashed { .. } => K::TipSlashed,
            Self::ElectionNewTerm { .. } => K::ElectionNewTerm,
            Self::ElectionEmptyTerm { .. } => K::ElectionEmptyTerm,
            Self::ElectionCandidacySubmitted { .. } => K::ElectionCandidacySubmitted,
            Self::ElectionMemberKicked { .. } => K::ElectionMemberKicked,
            Self::ElectionMemberRenounced { .. } => K::ElectionMemberRenounced,
            Self::TreasuryRewardMinting { .. } => K::TreasuryRewardMinting,
            Self::TreasuryRewardMintingV2 { .. } => K::TreasuryRewardMintingV2,
            Self::IdentitySet { .. } => K::IdentitySet,
            Self::IdentityCleared { .. } => K::IdentityCleared,
            Self::IdentityKilled { .. } => K::IdentityKilled,
            Self::NewSession { .. } => K::NewSession,
            Self::AllGood { .. } => K::AllGood,
            Self::HeartbeatReceived { .. } => K::HeartbeatReceived,
            Self::SomeOffline { .. } => K::SomeOffline,
            Self::Offence { .. } => K::Offence,
        }
    }

    /// The governance entity this event belongs to, if any.
    pub fn entity(&self) -> Option<EntityRef> {
        use EntityEventKind::*;
        use EntityKind::*;
        let (kind, event, id) = match self {
            Self::DemocracyProposed { proposal_index, .. } => {
                (DemocracyProposal, Create, proposal_index.to_string())
            }
            Self::DemocracySeconded { proposal_index, .. } => {
                (DemocracyProposal, Vote, proposal_index.to_string())
            }
            Self::DemocracyTabled { proposal_index } => {
                (DemocracyProposal, Complete, proposal_index.to_string())
            }
            Self::DemocracyStarted { referendum_index, .. } => {
                (DemocracyReferendum, Create, referendum_index.to_string())
            }
            Self::DemocracyVoted { referendum_index, .. } => {
                (DemocracyReferendum, Vote, referendum_index.to_string())
            }
            Self::DemocracyPassed { referendum_index, .. } => {
                (DemocracyReferendum, Update, referendum_index.to_string())
            }
            Self::DemocracyNotPassed { referendum_index }
            | Self::DemocracyCancelled { referendum_index }
            | Self::DemocracyExecuted { referendum_index, .. } => {
                (DemocracyReferendum, Complete, referendum_index.to_string())
            }
            Self::PreimageNoted { proposal_hash, .. } => {
                (DemocracyPreimage, Create, proposal_hash.clone())
            }
            Self::PreimageMissing { proposal_hash, .. } => {
                (DemocracyPreimage, Update, proposal_hash.clone())
            }
            Self::PreimageUsed { proposal_hash, .. }
            | Self::PreimageInvalid { proposal_hash, .. }
            | Self::PreimageReaped { proposal_hash, .. } => {
                (DemocracyPreimage, Complete, proposal_hash.clone())
            }
            Self::TreasuryProposed { proposal_index, .. } => {
                (TreasuryProposal, Create, proposal_index.to_string())
            }
            Self::TreasuryAwarded { proposal_index, .. }
            | Self::TreasuryRejected { proposal_index } => {
                (TreasuryProposal, Complete, proposal_index.to_string())
            }
            Self::NewTip { proposal_hash, .. } => (TipProposal, Create, proposal_hash.clone()),
            Self::TipVoted { proposal_hash, .. } => (TipProposal, Vote, proposal_hash.clone()),
            Self::TipClosing { proposal_hash, .. } => {
                (TipProposal, Update, proposal_hash.clone())
            }
            Self::TipClosed { proposal_hash, .. }
            | Self::TipRetracted { proposal_hash }
            | Self::TipSlashed { proposal_hash, .. } => {
                (TipProposal, Complete, proposal_hash.clone())
            }
            _ => return None,
        };
        Some(EntityRef { kind, event, id })
    }
}

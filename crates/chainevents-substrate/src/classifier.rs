//! Maps runtime `section.method` names to canonical kinds.

use chainevents_core::payload::SubstrateKind;

use crate::types::RuntimeVersion;

/// First runtime version whose treasury-reward event carries the pot address.
const TREASURY_MINTING_V2_SPEC: u32 = 34;

/// Kind of a runtime event, or `None` if the pipeline does not track it.
pub fn classify_event(version: &RuntimeVersion, section: &str, method: &str) -> Option<SubstrateKind> {
    use SubstrateKind as K;
    let kind = match (section, method) {
        ("staking", "Slash" | "Slashed") => K::Slash,
        ("staking", "Reward" | "Rewarded") => K::Reward,
        ("staking", "Bonded") => K::Bonded,
        ("staking", "Unbonded") => K::Unbonded,
        ("staking", "StakingElection") => K::StakingElection,

        ("balances", "Transfer") => K::BalanceTransfer,

        ("democracy", "Delegated") => K::VoteDelegated,
        ("democracy", "Proposed") => K::DemocracyProposed,
        ("democracy", "Tabled") => K::DemocracyTabled,
        ("democracy", "Started") => K::DemocracyStarted,
        ("democracy", "Passed") => K::DemocracyPassed,
        ("democracy", "NotPassed") => K::DemocracyNotPassed,
        ("democracy", "Cancelled") => K::DemocracyCancelled,
        ("democracy", "Executed") => K::DemocracyExecuted,
        ("democracy", "PreimageNoted") => K::PreimageNoted,
        ("democracy", "PreimageUsed") => K::PreimageUsed,
        ("democracy", "PreimageInvalid") => K::PreimageInvalid,
        ("democracy", "PreimageMissing") => K::PreimageMissing,
        ("democracy", "PreimageReaped") => K::PreimageReaped,

        ("treasury", "Proposed") => K::TreasuryProposed,
        ("treasury", "Awarded") => K::TreasuryAwarded,
        ("treasury", "Rejected") => K::TreasuryRejected,
        // Tips lived in the treasury pallet before moving to their own.
        ("treasury" | "tips", "NewTip") => K::NewTip,
        ("treasury" | "tips", "TipClosing") => K::TipClosing,
        ("treasury" | "tips", "TipClosed") => K::TipClosed,
        ("treasury" | "tips", "TipRetracted") => K::TipRetracted,
        ("treasury" | "tips", "TipSlashed") => K::TipSlashed,

        ("elections" | "electionsPhragmen", "NewTerm") => K::ElectionNewTerm,
        ("elections" | "electionsPhragmen", "EmptyTerm") => K::ElectionEmptyTerm,
        ("elections" | "electionsPhragmen", "MemberKicked") => K::ElectionMemberKicked,
        ("elections" | "electionsPhragmen", "MemberRenounced") => K::ElectionMemberRenounced,

        ("treasuryReward", "TreasuryMinting") => {
            if version.spec_name == "edgeware" && version.spec_version >= TREASURY_MINTING_V2_SPEC {
                K::TreasuryRewardMintingV2
            } else {
                K::TreasuryRewardMinting
            }
        }

        ("identity", "IdentitySet") => K::IdentitySet,
        ("identity", "IdentityCleared") => K::IdentityCleared,
        ("identity", "IdentityKilled") => K::IdentityKilled,

        ("session", "NewSession") => K::NewSession,

        ("imOnline", "AllGood") => K::AllGood,
        ("imOnline", "HeartbeatReceived") => K::HeartbeatReceived,
        ("imOnline", "SomeOffline") => K::SomeOffline,

        ("offences", "Offence") => K::Offence,

        _ => return None,
    };
    Some(kind)
}

/// Kind of a signed extrinsic, or `None` if it is not tracked.
pub fn classify_extrinsic(section: &str, method: &str) -> Option<SubstrateKind> {
    use SubstrateKind as K;
    match (section, method) {
        ("democracy", "second") => Some(K::DemocracySeconded),
        ("democracy", "vote") => Some(K::DemocracyVoted),
        ("treasury" | "tips", "tip") => Some(K::TipVoted),
        ("elections" | "electionsPhragmen", "submitCandidacy") => {
            Some(K::ElectionCandidacySubmitted)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(name: &str, spec: u32) -> RuntimeVersion {
        RuntimeVersion {
            spec_name: name.into(),
            spec_version: spec,
        }
    }

    #[test]
    fn known_events_classify() {
        let v = version("kusama", 2000);
        assert_eq!(classify_event(&v, "balances", "Transfer"), Some(SubstrateKind::BalanceTransfer));
        assert_eq!(classify_event(&v, "tips", "NewTip"), Some(SubstrateKind::NewTip));
        assert_eq!(classify_event(&v, "treasury", "NewTip"), Some(SubstrateKind::NewTip));
        assert_eq!(
            classify_event(&v, "electionsPhragmen", "NewTerm"),
            Some(SubstrateKind::ElectionNewTerm)
        );
        assert_eq!(classify_event(&v, "offences", "Offence"), Some(SubstrateKind::Offence));
    }

    #[test]
    fn unknown_names_are_none() {
        let v = version("kusama", 2000);
        assert_eq!(classify_event(&v, "system", "ExtrinsicSuccess"), None);
        assert_eq!(classify_event(&v, "balances", "Deposit"), None);
        assert_eq!(classify_extrinsic("timestamp", "set"), None);
    }

    #[test]
    fn treasury_minting_version_gate() {
        let old = version("edgeware", 33);
        let new = version("edgeware", 34);
        let other = version("kusama", 2000);
        let method = ("treasuryReward", "TreasuryMinting");
        assert_eq!(
            classify_event(&old, method.0, method.1),
            Some(SubstrateKind::TreasuryRewardMinting)
        );
        assert_eq!(
            classify_event(&new, method.0, method.1),
            Some(SubstrateKind::TreasuryRewardMintingV2)
        );
        assert_eq!(
            classify_event(&other, method.0, method.1),
            Some(SubstrateKind::TreasuryRewardMinting)
        );
    }

    #[test]
    fn extrinsic_kinds() {
        for (section, method, kind) in [
            ("democracy", "second", SubstrateKind::DemocracySeconded),
            ("democracy", "vote", SubstrateKind::DemocracyVoted),
            ("tips", "tip", SubstrateKind::TipVoted),
            ("elections", "submitCandidacy", SubstrateKind::ElectionCandidacySubmitted),
        ] {
            assert_eq!(classify_extrinsic(section, method), Some(kind));
            assert!(kind.is_extrinsic());
        }
    }
}

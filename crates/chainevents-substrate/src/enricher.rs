//! Turns a classified runtime record into a [`CanonicalEvent`].
//!
//! Most kinds are decoded from the record's own arguments; some need extra
//! storage reads through the [`SubstrateApi`] (proposal details, session
//! validators, identity registrations). Any failure is reported as
//! [`Error::Enrich`] carrying the kind.

use std::collections::BTreeMap;
use std::sync::Arc;

use chainevents_core::payload::substrate::{IdentityJudgement, ValidatorInfo};
use chainevents_core::payload::{SubstrateEvent, SubstrateKind};
use chainevents_core::{CanonicalEvent, Error, Result};
use futures::future::try_join_all;

use crate::api::SubstrateApi;
use crate::args::{
    arg, as_accounts, as_balance, as_bool, as_string, as_u32, balance_u128, execution_ok,
    hex_to_utf8, parse_account_vote,
};
use crate::types::{Header, RawEvent, RawExtrinsic};

/// Enrichment options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnricherConfig {
    /// Balance transfers smaller than this share of total issuance (parts per
    /// million) are dropped.
    pub balance_transfer_threshold_permill: Option<u64>,
}

/// A record the classifier recognised.
#[derive(Debug, Clone, Copy)]
pub enum RawRecord<'a> {
    Event(&'a RawEvent),
    Extrinsic(&'a RawExtrinsic),
}

/// Payload plus its notification lists, before the envelope is attached.
struct Enriched {
    data: SubstrateEvent,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
}

impl Enriched {
    fn plain(data: SubstrateEvent) -> Self {
        Self {
            data,
            include: None,
            exclude: None,
        }
    }

    fn include(mut self, addresses: Vec<String>) -> Self {
        self.include = Some(addresses);
        self
    }

    fn exclude(mut self, addresses: Vec<String>) -> Self {
        self.exclude = Some(addresses);
        self
    }
}

pub struct Enricher {
    chain: String,
    api: Arc<dyn SubstrateApi>,
    config: EnricherConfig,
}

impl Enricher {
    pub fn new(chain: impl Into<String>, api: Arc<dyn SubstrateApi>, config: EnricherConfig) -> Self {
        Self {
            chain: chain.into(),
            api,
            config,
        }
    }

    /// `Ok(None)` for a record that decodes but is not delivered (a balance
    /// transfer under the configured threshold).
    pub async fn enrich(
        &self,
        header: &Header,
        kind: SubstrateKind,
        record: RawRecord<'_>,
    ) -> Result<Option<CanonicalEvent>> {
        let enriched = match record {
            RawRecord::Event(event) => self.from_event(header, kind, event).await,
            RawRecord::Extrinsic(extrinsic) => self.from_extrinsic(kind, extrinsic).await.map(Some),
        }
        .map_err(|e| match e {
            Error::Enrich { .. } => e,
            other => Error::enrich(kind, other.to_string()),
        })?;
        let Some(enriched) = enriched else {
            return Ok(None);
        };

        let mut event = CanonicalEvent::new(self.chain.as_str(), header.number, enriched.data);
        if let Some(include) = enriched.include {
            event = event.include(include);
        }
        if let Some(exclude) = enriched.exclude {
            event = event.exclude(exclude);
        }
        Ok(Some(event))
    }

    async fn from_event(&self, header: &Header, kind: SubstrateKind, event: &RawEvent) -> Result<Option<Enriched>> {
        use SubstrateKind as K;
        let data = &event.data;
        let name = kind.as_str();
        let at = header.hash.as_str();

        let enriched = match kind {
            // ── Balances ────────────────────────────────────────────────────
            K::BalanceTransfer => {
                let sender = as_string(arg(data, 0, name)?)?;
                let dest = as_string(arg(data, 1, name)?)?;
                let raw_value = arg(data, 2, name)?;
                if let Some(permill) = self.config.balance_transfer_threshold_permill.filter(|p| *p > 0) {
                    let issuance = self.api.total_issuance().await?;
                    let scaled = balance_u128(raw_value)?.saturating_mul(1_000_000) / u128::from(permill);
                    if scaled < issuance {
                        return Ok(None);
                    }
                }
                let parties = vec![sender.clone(), dest.clone()];
                Enriched::plain(SubstrateEvent::BalanceTransfer {
                    sender,
                    dest,
                    value: as_balance(raw_value)?,
                })
                .exclude(parties)
            }

            // ── ImOnline ────────────────────────────────────────────────────
            K::HeartbeatReceived => Enriched::plain(SubstrateEvent::HeartbeatReceived {
                authority_id: as_string(arg(data, 0, name)?)?,
            }),
            K::SomeOffline => {
                let session_index = self.api.session_index(at).await?;
                Enriched::plain(SubstrateEvent::SomeOffline {
                    session_index: session_index.saturating_sub(1),
                    validators: as_accounts(arg(data, 0, name)?)?,
                })
            }
            K::AllGood => {
                let session_index = self.api.session_index(at).await?;
                let validators = self.api.session_validators(at).await?;
                Enriched::plain(SubstrateEvent::AllGood {
                    session_index: session_index.saturating_sub(1),
                    validators,
                })
            }

            // ── Offences ────────────────────────────────────────────────────
            K::Offence => {
                let offence_kind = as_string(arg(data, 0, name)?)?;
                let opaque_time_slot = as_string(arg(data, 1, name)?)?;
                let applied = data.get(2).map(as_bool).transpose()?.unwrap_or(false);
                let offenders = self
                    .api
                    .offence_offenders(&offence_kind, &opaque_time_slot)
                    .await?;
                Enriched::plain(SubstrateEvent::Offence {
                    offence_kind,
                    opaque_time_slot,
                    applied,
                    offenders,
                })
            }

            // ── Session ─────────────────────────────────────────────────────
            K::NewSession => self.new_session(at).await?,

            // ── Staking ─────────────────────────────────────────────────────
            K::Reward => {
                let legacy = event.type_names.first().is_some_and(|t| t == "Balance");
                if legacy {
                    Enriched::plain(SubstrateEvent::Reward {
                        validator: None,
                        amount: as_balance(arg(data, 0, name)?)?,
                    })
                } else {
                    let validator = as_string(arg(data, 0, name)?)?;
                    Enriched::plain(SubstrateEvent::Reward {
                        validator: Some(validator.clone()),
                        amount: as_balance(arg(data, 1, name)?)?,
                    })
                    .include(vec![validator])
                }
            }
            K::Slash => {
                let validator = as_string(arg(data, 0, name)?)?;
                Enriched::plain(SubstrateEvent::Slash {
                    validator: validator.clone(),
                    amount: as_balance(arg(data, 1, name)?)?,
                })
                .include(vec![validator])
            }
            K::Bonded | K::Unbonded => {
                let stash = as_string(arg(data, 0, name)?)?;
                let amount = as_balance(arg(data, 1, name)?)?;
                let controller = self.api.bonded(at, &stash).await?.ok_or_else(|| {
                    Error::enrich(kind, format!("could not fetch staking controller for {stash}"))
                })?;
                let payload = if kind == K::Bonded {
                    SubstrateEvent::Bonded {
                        stash: stash.clone(),
                        amount,
                        controller,
                    }
                } else {
                    SubstrateEvent::Unbonded {
                        stash: stash.clone(),
                        amount,
                        controller,
                    }
                };
                Enriched::plain(payload).include(vec![stash])
            }
            K::StakingElection => {
                let era = self.api.active_era().await?;
                let validators = self.api.elected_validators().await?;
                Enriched::plain(SubstrateEvent::StakingElection { era, validators })
            }

            // ── Democracy ───────────────────────────────────────────────────
            K::VoteDelegated => {
                let who = as_string(arg(data, 0, name)?)?;
                let target = as_string(arg(data, 1, name)?)?;
                Enriched::plain(SubstrateEvent::VoteDelegated {
                    who,
                    target: target.clone(),
                })
                .include(vec![target])
            }
            K::DemocracyProposed => {
                let proposal_index = as_u32(arg(data, 0, name)?)?;
                let deposit = as_balance(arg(data, 1, name)?)?;
                let prop = self
                    .api
                    .public_props()
                    .await?
                    .into_iter()
                    .find(|p| p.index == proposal_index)
                    .ok_or_else(|| {
                        Error::enrich(kind, format!("could not fetch info for proposal {proposal_index}"))
                    })?;
                Enriched::plain(SubstrateEvent::DemocracyProposed {
                    proposal_index,
                    proposal_hash: prop.hash,
                    deposit,
                    proposer: prop.proposer.clone(),
                })
                .exclude(vec![prop.proposer])
            }
            K::DemocracyTabled => Enriched::plain(SubstrateEvent::DemocracyTabled {
                proposal_index: as_u32(arg(data, 0, name)?)?,
            }),
            K::DemocracyStarted => {
                let referendum_index = as_u32(arg(data, 0, name)?)?;
                let vote_threshold = as_string(arg(data, 1, name)?)?;
                let status = self.api.referendum_info(referendum_index).await?.ok_or_else(|| {
                    Error::enrich(kind, format!("could not find info for referendum {referendum_index}"))
                })?;
                Enriched::plain(SubstrateEvent::DemocracyStarted {
                    referendum_index,
                    proposal_hash: status.proposal_hash,
                    vote_threshold,
                    end_block: status.end,
                })
            }
            K::DemocracyPassed => {
                let referendum_index = as_u32(arg(data, 0, name)?)?;
                // Absent from the queue means it was already executed.
                let dispatch_block = self
                    .api
                    .dispatch_queue()
                    .await?
                    .into_iter()
                    .find(|d| d.index == referendum_index)
                    .map(|d| d.at);
                Enriched::plain(SubstrateEvent::DemocracyPassed {
                    referendum_index,
                    dispatch_block,
                })
            }
            K::DemocracyNotPassed => Enriched::plain(SubstrateEvent::DemocracyNotPassed {
                referendum_index: as_u32(arg(data, 0, name)?)?,
            }),
            K::DemocracyCancelled => Enriched::plain(SubstrateEvent::DemocracyCancelled {
                referendum_index: as_u32(arg(data, 0, name)?)?,
            }),
            K::DemocracyExecuted => Enriched::plain(SubstrateEvent::DemocracyExecuted {
                referendum_index: as_u32(arg(data, 0, name)?)?,
                execution_ok: execution_ok(arg(data, 1, name)?)?,
            }),

            // ── Preimages ───────────────────────────────────────────────────
            K::PreimageNoted => {
                let proposal_hash = as_string(arg(data, 0, name)?)?;
                let noter = as_string(arg(data, 1, name)?)?;
                let image = self.api.preimage(&proposal_hash).await?.ok_or_else(|| {
                    Error::enrich(kind, format!("could not find info for preimage {proposal_hash}"))
                })?;
                Enriched::plain(SubstrateEvent::PreimageNoted {
                    proposal_hash,
                    noter: noter.clone(),
                    preimage: image.call,
                })
                .exclude(vec![noter])
            }
            K::PreimageUsed => Enriched::plain(SubstrateEvent::PreimageUsed {
                proposal_hash: as_string(arg(data, 0, name)?)?,
                noter: as_string(arg(data, 1, name)?)?,
            }),
            K::PreimageInvalid => Enriched::plain(SubstrateEvent::PreimageInvalid {
                proposal_hash: as_string(arg(data, 0, name)?)?,
                referendum_index: as_u32(arg(data, 1, name)?)?,
            }),
            K::PreimageMissing => Enriched::plain(SubstrateEvent::PreimageMissing {
                proposal_hash: as_string(arg(data, 0, name)?)?,
                referendum_index: as_u32(arg(data, 1, name)?)?,
            }),
            K::PreimageReaped => {
                let reaper = as_string(arg(data, 3, name)?)?;
                Enriched::plain(SubstrateEvent::PreimageReaped {
                    proposal_hash: as_string(arg(data, 0, name)?)?,
                    noter: as_string(arg(data, 1, name)?)?,
                    reaper: reaper.clone(),
                })
                .exclude(vec![reaper])
            }

            // ── Tips ────────────────────────────────────────────────────────
            K::NewTip => {
                let proposal_hash = as_string(arg(data, 0, name)?)?;
                let tip = self
                    .api
                    .tip(&proposal_hash)
                    .await?
                    .ok_or_else(|| Error::enrich(kind, format!("could not find tip {proposal_hash}")))?;
                Enriched::plain(SubstrateEvent::NewTip {
                    proposal_hash,
                    reason: hex_to_utf8(&tip.reason),
                    who: tip.who,
                    finder: tip.finder,
                    deposit: tip.deposit,
                    finders_fee: tip.finders_fee,
                })
            }
            K::TipClosing => {
                let proposal_hash = as_string(arg(data, 0, name)?)?;
                let closing = self
                    .api
                    .tip(&proposal_hash)
                    .await?
                    .and_then(|t| t.closes)
                    .ok_or_else(|| {
                        Error::enrich(kind, format!("tip {proposal_hash} has no closing block"))
                    })?;
                Enriched::plain(SubstrateEvent::TipClosing {
                    proposal_hash,
                    closing,
                })
            }
            K::TipClosed => Enriched::plain(SubstrateEvent::TipClosed {
                proposal_hash: as_string(arg(data, 0, name)?)?,
                who: as_string(arg(data, 1, name)?)?,
                payout: as_balance(arg(data, 2, name)?)?,
            }),
            K::TipRetracted => Enriched::plain(SubstrateEvent::TipRetracted {
                proposal_hash: as_string(arg(data, 0, name)?)?,
            }),
            K::TipSlashed => Enriched::plain(SubstrateEvent::TipSlashed {
                proposal_hash: as_string(arg(data, 0, name)?)?,
                finder: as_string(arg(data, 1, name)?)?,
                deposit: as_balance(arg(data, 2, name)?)?,
            }),

            // ── Treasury ────────────────────────────────────────────────────
            K::TreasuryProposed => {
                let proposal_index = as_u32(arg(data, 0, name)?)?;
                let proposal = self.api.treasury_proposal(proposal_index).await?.ok_or_else(|| {
                    Error::enrich(kind, format!("could not fetch treasury proposal {proposal_index}"))
                })?;
                Enriched::plain(SubstrateEvent::TreasuryProposed {
                    proposal_index,
                    proposer: proposal.proposer.clone(),
                    value: proposal.value,
                    beneficiary: proposal.beneficiary,
                    bond: proposal.bond,
                })
                .exclude(vec![proposal.proposer])
            }
            K::TreasuryAwarded => Enriched::plain(SubstrateEvent::TreasuryAwarded {
                proposal_index: as_u32(arg(data, 0, name)?)?,
                value: as_balance(arg(data, 1, name)?)?,
                beneficiary: as_string(arg(data, 2, name)?)?,
            }),
            K::TreasuryRejected => Enriched::plain(SubstrateEvent::TreasuryRejected {
                proposal_index: as_u32(arg(data, 0, name)?)?,
            }),

            // ── Elections ───────────────────────────────────────────────────
            K::ElectionNewTerm => {
                let new_members = as_accounts(arg(data, 0, name)?)?;
                let all_members = self.api.election_members().await?;
                let round = self.api.election_rounds().await?;
                Enriched::plain(SubstrateEvent::ElectionNewTerm {
                    round,
                    new_members,
                    all_members,
                })
            }
            K::ElectionEmptyTerm => {
                let members = self.api.election_members().await?;
                let round = self.api.election_rounds().await?;
                Enriched::plain(SubstrateEvent::ElectionEmptyTerm { round, members })
            }
            K::ElectionMemberKicked => Enriched::plain(SubstrateEvent::ElectionMemberKicked {
                who: as_string(arg(data, 0, name)?)?,
            }),
            K::ElectionMemberRenounced => Enriched::plain(SubstrateEvent::ElectionMemberRenounced {
                who: as_string(arg(data, 0, name)?)?,
            }),

            // ── Treasury reward ─────────────────────────────────────────────
            K::TreasuryRewardMinting => Enriched::plain(SubstrateEvent::TreasuryRewardMinting {
                pot: as_balance(arg(data, 0, name)?)?,
                reward: as_balance(arg(data, 1, name)?)?,
            }),
            K::TreasuryRewardMintingV2 => Enriched::plain(SubstrateEvent::TreasuryRewardMintingV2 {
                pot: as_balance(arg(data, 0, name)?)?,
                pot_address: as_string(arg(data, 2, name)?)?,
            }),

            // ── Identity ────────────────────────────────────────────────────
            K::IdentitySet => {
                let who = as_string(arg(data, 0, name)?)?;
                let registration = self
                    .api
                    .identity_of(&who)
                    .await?
                    .ok_or_else(|| Error::enrich(kind, "unable to retrieve identity info"))?;
                let display_name = registration
                    .display
                    .ok_or_else(|| Error::enrich(kind, "no display name set"))?;
                let judgements = if registration.judgements.is_empty() {
                    Vec::new()
                } else {
                    let registrars = self.api.registrars().await?;
                    registration
                        .judgements
                        .iter()
                        .map(|(id, judgement)| {
                            registrar_account(&registrars, *id)
                                .map(|account| (account, IdentityJudgement::from_runtime(judgement)))
                                .ok_or_else(|| Error::enrich(kind, format!("invalid judgement from registrar {id}")))
                        })
                        .collect::<Result<Vec<_>>>()?
                };
                Enriched::plain(SubstrateEvent::IdentitySet {
                    who: who.clone(),
                    display_name,
                    judgements,
                })
                .exclude(vec![who])
            }
            K::IdentityCleared => {
                let who = as_string(arg(data, 0, name)?)?;
                Enriched::plain(SubstrateEvent::IdentityCleared { who: who.clone() }).exclude(vec![who])
            }
            K::IdentityKilled => Enriched::plain(SubstrateEvent::IdentityKilled {
                who: as_string(arg(data, 0, name)?)?,
            }),

            K::DemocracySeconded | K::DemocracyVoted | K::TipVoted | K::ElectionCandidacySubmitted => {
                return Err(Error::enrich(kind, "decoded from extrinsics, not events"));
            }
        };
        Ok(Some(enriched))
    }

    async fn from_extrinsic(&self, kind: SubstrateKind, extrinsic: &RawExtrinsic) -> Result<Enriched> {
        use SubstrateKind as K;
        let args = &extrinsic.args;
        let name = kind.as_str();
        let signer = extrinsic.signer.clone();

        let enriched = match kind {
            K::DemocracySeconded => Enriched::plain(SubstrateEvent::DemocracySeconded {
                proposal_index: as_u32(arg(args, 0, name)?)?,
                who: signer.clone(),
            })
            .exclude(vec![signer]),
            K::DemocracyVoted => {
                let referendum_index = as_u32(arg(args, 0, name)?)?;
                let vote = parse_account_vote(arg(args, 1, name)?)?;
                Enriched::plain(SubstrateEvent::DemocracyVoted {
                    referendum_index,
                    who: signer.clone(),
                    is_aye: vote.is_aye,
                    conviction: vote.conviction,
                    balance: vote.balance,
                })
                .exclude(vec![signer])
            }
            K::TipVoted => Enriched::plain(SubstrateEvent::TipVoted {
                proposal_hash: as_string(arg(args, 0, name)?)?,
                who: signer,
                value: as_balance(arg(args, 1, name)?)?,
            }),
            K::ElectionCandidacySubmitted => {
                let round = self.api.election_rounds().await?;
                Enriched::plain(SubstrateEvent::ElectionCandidacySubmitted {
                    round,
                    candidate: signer.clone(),
                })
                .exclude(vec![signer])
            }
            other => return Err(Error::enrich(other, "decoded from events, not extrinsics")),
        };
        Ok(enriched)
    }

    async fn new_session(&self, at: &str) -> Result<Enriched> {
        let session_index = self.api.session_index(at).await?;
        let validators = self.api.session_validators(at).await?;
        let current_era = self.api.current_era(at).await?;

        let elected = match current_era {
            Some(era) => self.api.eras_stakers_keys(at, era).await?,
            None => Vec::new(),
        };
        let next_elected = if elected.is_empty() {
            validators.clone()
        } else {
            elected
        };
        let waiting = self
            .api
            .validator_stashes(at)
            .await?
            .into_iter()
            .filter(|stash| !next_elected.contains(stash))
            .collect();

        let era_points = match current_era {
            Some(era) => self.api.era_points(at, era).await?,
            None => BTreeMap::new(),
        };

        let mut validator_info = BTreeMap::new();
        for validator in &validators {
            let commission_perbill = match current_era {
                Some(era) => self.api.validator_commission(at, era, validator).await?,
                None => 0,
            };
            let reward_destination = self.api.payee(at, validator).await?;
            let controller = self
                .api
                .bonded(at, validator)
                .await?
                .unwrap_or_else(|| validator.clone());
            validator_info.insert(
                validator.clone(),
                ValidatorInfo {
                    commission_perbill,
                    controller,
                    reward_destination,
                    era_points: era_points.get(validator).copied().unwrap_or(0),
                },
            );
        }

        let active_exposures = match current_era {
            Some(era) => {
                let exposures = try_join_all(
                    validators
                        .iter()
                        .map(|v| self.api.exposure(at, era, v)),
                )
                .await?;
                validators.iter().cloned().zip(exposures).collect()
            }
            None => BTreeMap::new(),
        };

        Ok(Enriched::plain(SubstrateEvent::NewSession {
            active_exposures,
            active: validators,
            waiting,
            session_index,
            current_era,
            validator_info,
        }))
    }
}

fn registrar_account(registrars: &[Option<String>], id: u32) -> Option<String> {
    registrars.get(id as usize).cloned().flatten()
}

//! Compound-style governors (GovernorAlpha and GovernorBravo).

use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolEvent};
use async_trait::async_trait;
use chainevents_core::payload::{CompoundEvent, CompoundKind};
use chainevents_core::{CanonicalEvent, DisconnectedRange, EntityKind, Error, Network, Result, StorageFetcher};
use tracing::Instrument;

use crate::abi::{address, addresses, call, decimals, decode_log, hex_bytes, to_u64};
use crate::client::{EvmRpcClient, RawLog};
use crate::protocol::ContractProtocol;
use crate::protocols::{expect_entity, parse_index, walk_newest_first, ProposalHistory};

sol! {
    interface GovernorAlpha {
        event ProposalCreated(uint256 id, address proposer, address[] targets, uint256[] values, string[] signatures, bytes[] calldatas, uint256 startBlock, uint256 endBlock, string description);
        event VoteCast(address voter, uint256 proposalId, bool support, uint256 votes);
        event ProposalCanceled(uint256 id);
        event ProposalQueued(uint256 id, uint256 eta);
        event ProposalExecuted(uint256 id);

        function proposalCount() external view returns (uint256);
        // Common prefix of the Alpha and Bravo layouts.
        function proposals(uint256 proposalId) external view returns (uint256 id, address proposer, uint256 eta, uint256 startBlock, uint256 endBlock);
        function getActions(uint256 proposalId) external view returns (address[] targets, uint256[] values, string[] signatures, bytes[] calldatas);
        function state(uint256 proposalId) external view returns (uint8);
    }

    interface GovernorBravo {
        event VoteCast(address indexed voter, uint256 proposalId, uint8 support, uint256 votes, string reason);
    }
}

const SIGNATURES: [(B256, CompoundKind); 6] = [
    (GovernorAlpha::ProposalCreated::SIGNATURE_HASH, CompoundKind::ProposalCreated),
    (GovernorAlpha::VoteCast::SIGNATURE_HASH, CompoundKind::VoteCast),
    (GovernorBravo::VoteCast::SIGNATURE_HASH, CompoundKind::VoteCast),
    (GovernorAlpha::ProposalCanceled::SIGNATURE_HASH, CompoundKind::ProposalCanceled),
    (GovernorAlpha::ProposalQueued::SIGNATURE_HASH, CompoundKind::ProposalQueued),
    (GovernorAlpha::ProposalExecuted::SIGNATURE_HASH, CompoundKind::ProposalExecuted),
];

/// `state()` of a governor proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalState {
    Pending,
    Active,
    Canceled,
    Defeated,
    Succeeded,
    Queued,
    Expired,
    Executed,
}

impl ProposalState {
    pub fn from_u8(v: u8) -> Result<Self> {
        Ok(match v {
            0 => Self::Pending,
            1 => Self::Active,
            2 => Self::Canceled,
            3 => Self::Defeated,
            4 => Self::Succeeded,
            5 => Self::Queued,
            6 => Self::Expired,
            7 => Self::Executed,
            other => return Err(Error::Decode(format!("unknown proposal state {other}"))),
        })
    }

    /// No further transitions are possible.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Canceled | Self::Defeated | Self::Expired | Self::Executed)
    }
}

/// Governor proposal and vote events.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompoundProtocol;

impl CompoundProtocol {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContractProtocol for CompoundProtocol {
    type Kind = CompoundKind;

    fn network(&self) -> Network {
        Network::Compound
    }

    fn topics(&self) -> Vec<B256> {
        SIGNATURES.iter().map(|(topic, _)| *topic).collect()
    }

    fn classify(&self, log: &RawLog) -> Option<CompoundKind> {
        let topic0 = log.topic0()?;
        SIGNATURES
            .iter()
            .find(|(topic, _)| *topic == topic0)
            .map(|(_, kind)| *kind)
    }

    async fn enrich(&self, chain: &str, block: u64, log: &RawLog, kind: CompoundKind) -> Result<Option<CanonicalEvent>> {
        enrich_log(chain, block, log, kind)
            .map(Some)
            .map_err(|e| Error::enrich(kind, e.to_string()))
    }
}

fn enrich_log(chain: &str, block: u64, log: &RawLog, kind: CompoundKind) -> Result<CanonicalEvent> {
    let event = match kind {
        CompoundKind::ProposalCreated => {
            let ev: GovernorAlpha::ProposalCreated = decode_log(log)?;
            let proposer = address(&ev.proposer);
            CanonicalEvent::new(
                chain,
                block,
                CompoundEvent::ProposalCreated {
                    id: ev.id.to_string(),
                    proposer: proposer.clone(),
                    targets: addresses(&ev.targets),
                    values: decimals(&ev.values),
                    signatures: ev.signatures,
                    calldatas: ev.calldatas.iter().map(|c| hex_bytes(c)).collect(),
                    start_block: to_u64(ev.startBlock, "start block")?,
                    end_block: to_u64(ev.endBlock, "end block")?,
                    description: ev.description,
                },
            )
            .exclude(vec![proposer])
        }
        CompoundKind::VoteCast => {
            let (id, voter, support, votes, reason) =
                if log.topic0() == Some(GovernorBravo::VoteCast::SIGNATURE_HASH) {
                    let ev: GovernorBravo::VoteCast = decode_log(log)?;
                    (ev.proposalId, ev.voter, ev.support, ev.votes, Some(ev.reason))
                } else {
                    let ev: GovernorAlpha::VoteCast = decode_log(log)?;
                    (ev.proposalId, ev.voter, u8::from(ev.support), ev.votes, None)
                };
            let voter = address(&voter);
            CanonicalEvent::new(
                chain,
                block,
                CompoundEvent::VoteCast {
                    id: id.to_string(),
                    voter: voter.clone(),
                    support,
                    votes: votes.to_string(),
                    reason,
                },
            )
            .exclude(vec![voter])
        }
        CompoundKind::ProposalCanceled => {
            let ev: GovernorAlpha::ProposalCanceled = decode_log(log)?;
            CanonicalEvent::new(chain, block, CompoundEvent::ProposalCanceled { id: ev.id.to_string() })
        }
        CompoundKind::ProposalQueued => {
            let ev: GovernorAlpha::ProposalQueued = decode_log(log)?;
            CanonicalEvent::new(
                chain,
                block,
                CompoundEvent::ProposalQueued {
                    id: ev.id.to_string(),
                    eta: to_u64(ev.eta, "eta")?,
                },
            )
        }
        CompoundKind::ProposalExecuted => {
            let ev: GovernorAlpha::ProposalExecuted = decode_log(log)?;
            CanonicalEvent::new(chain, block, CompoundEvent::ProposalExecuted { id: ev.id.to_string() })
        }
    };
    Ok(event)
}

/// Rebuilds governor proposal history from contract storage.
///
/// `proposal-created` is placed at the proposal's start block; cancel, queue
/// and execute events follow at its end block (or the head, if earlier),
/// according to `state()`.
pub struct CompoundStorageFetcher {
    chain: String,
    client: Arc<dyn EvmRpcClient>,
    governor: String,
    span: tracing::Span,
}

impl CompoundStorageFetcher {
    pub fn new(chain: &str, client: Arc<dyn EvmRpcClient>, governor: &str) -> Self {
        Self {
            chain: chain.to_string(),
            client,
            governor: governor.to_lowercase(),
            span: tracing::info_span!("storage", chain, network = "compound"),
        }
    }

    async fn history(&self, id: u64, head: u64) -> Result<Option<ProposalHistory>> {
        let client = self.client.as_ref();
        let proposal_id = U256::from(id);
        let proposal = call(client, &self.governor, &GovernorAlpha::proposalsCall { proposalId: proposal_id }).await?;
        if proposal.proposer == Address::ZERO {
            return Ok(None);
        }
        let actions = call(client, &self.governor, &GovernorAlpha::getActionsCall { proposalId: proposal_id }).await?;
        let state = ProposalState::from_u8(
            call(client, &self.governor, &GovernorAlpha::stateCall { proposalId: proposal_id }).await?._0,
        )?;

        let start_block = to_u64(proposal.startBlock, "start block")?;
        let end_block = to_u64(proposal.endBlock, "end block")?;
        let eta = to_u64(proposal.eta, "eta")?;
        let settled_at = end_block.min(head);
        let id = id.to_string();

        let mut events = vec![CanonicalEvent::new(
            &self.chain,
            start_block,
            CompoundEvent::ProposalCreated {
                id: id.clone(),
                proposer: address(&proposal.proposer),
                targets: addresses(&actions.targets),
                values: decimals(&actions.values),
                signatures: actions.signatures,
                calldatas: actions.calldatas.iter().map(|c| hex_bytes(c)).collect(),
                start_block,
                end_block,
                description: String::new(),
            },
        )];
        match state {
            ProposalState::Canceled => events.push(CanonicalEvent::new(
                &self.chain,
                settled_at,
                CompoundEvent::ProposalCanceled { id },
            )),
            ProposalState::Queued => events.push(CanonicalEvent::new(
                &self.chain,
                settled_at,
                CompoundEvent::ProposalQueued { id, eta },
            )),
            ProposalState::Executed => {
                events.push(CanonicalEvent::new(
                    &self.chain,
                    settled_at,
                    CompoundEvent::ProposalQueued { id: id.clone(), eta },
                ));
                events.push(CanonicalEvent::new(
                    &self.chain,
                    settled_at,
                    CompoundEvent::ProposalExecuted { id },
                ));
            }
            ProposalState::Pending
            | ProposalState::Active
            | ProposalState::Defeated
            | ProposalState::Succeeded
            | ProposalState::Expired => {}
        }

        Ok(Some(ProposalHistory {
            start_block,
            events,
            completed: state.is_final(),
        }))
    }
}

#[async_trait]
impl StorageFetcher for CompoundStorageFetcher {
    async fn fetch(
        &self,
        range: Option<&DisconnectedRange>,
        fetch_all_completed: bool,
    ) -> Result<Vec<CanonicalEvent>> {
        async {
            let head = self.client.block_number().await?;
            let count = call(self.client.as_ref(), &self.governor, &GovernorAlpha::proposalCountCall {}).await?._0;
            let count = to_u64(count, "proposal count")?;
            walk_newest_first((1..=count).rev(), range, head, fetch_all_completed, |id| self.history(id, head)).await
        }
        .instrument(self.span.clone())
        .await
    }

    async fn fetch_one(&self, id: &str, entity: EntityKind) -> Result<Vec<CanonicalEvent>> {
        expect_entity(entity, EntityKind::CompoundProposal)?;
        let index = parse_index(id)?;
        async {
            let head = self.client.block_number().await?;
            match self.history(index, head).await? {
                Some(history) => Ok(history.events),
                None => {
                    tracing::warn!(id = index, "Proposal not found");
                    Ok(Vec::new())
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }
}

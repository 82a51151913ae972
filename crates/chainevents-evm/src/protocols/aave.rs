//! Aave governance v2 and the Aave governance token.

use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, SolEvent};
use async_trait::async_trait;
use chainevents_core::payload::{AaveEvent, AaveKind};
use chainevents_core::{CanonicalEvent, DisconnectedRange, EntityKind, Error, Network, Result, StorageFetcher};
use tracing::Instrument;

use crate::abi::{address, addresses, call, decimals, decode_log, hash, hex_bytes, to_u64};
use crate::client::{EvmRpcClient, RawLog};
use crate::protocol::ContractProtocol;
use crate::protocols::{expect_entity, parse_index, walk_newest_first, ProposalHistory};

sol! {
    interface AaveGovernanceV2 {
        struct ProposalWithoutVotes {
            uint256 id;
            address creator;
            address executor;
            address[] targets;
            uint256[] values;
            string[] signatures;
            bytes[] calldatas;
            bool[] withDelegatecalls;
            uint256 startBlock;
            uint256 endBlock;
            uint256 executionTime;
            uint256 forVotes;
            uint256 againstVotes;
            bool executed;
            bool canceled;
            address strategy;
            bytes32 ipfsHash;
        }

        event ProposalCreated(uint256 id, address indexed creator, address indexed executor, address[] targets, uint256[] values, string[] signatures, bytes[] calldatas, bool[] withDelegatecalls, uint256 startBlock, uint256 endBlock, address strategy, bytes32 ipfsHash);
        event ProposalCanceled(uint256 id);
        event ProposalQueued(uint256 id, uint256 executionTime, address indexed initiatorQueueing);
        event ProposalExecuted(uint256 id, address indexed initiatorExecution);
        event VoteEmitted(uint256 id, address indexed voter, bool support, uint256 votingPower);

        function getProposalsCount() external view returns (uint256);
        function getProposalById(uint256 proposalId) external view returns (ProposalWithoutVotes);
        function getProposalState(uint256 proposalId) external view returns (uint8);
    }

    interface AaveGovernanceToken {
        event DelegateChanged(address indexed delegator, address indexed delegatee, uint8 delegationType);
        event DelegatedPowerChanged(address indexed user, uint256 amount, uint8 delegationType);
        event Transfer(address indexed from, address indexed to, uint256 value);
        event Approval(address indexed owner, address indexed spender, uint256 value);
    }
}

const SIGNATURES: [(B256, AaveKind); 9] = [
    (AaveGovernanceV2::ProposalCreated::SIGNATURE_HASH, AaveKind::ProposalCreated),
    (AaveGovernanceV2::ProposalCanceled::SIGNATURE_HASH, AaveKind::ProposalCanceled),
    (AaveGovernanceV2::ProposalQueued::SIGNATURE_HASH, AaveKind::ProposalQueued),
    (AaveGovernanceV2::ProposalExecuted::SIGNATURE_HASH, AaveKind::ProposalExecuted),
    (AaveGovernanceV2::VoteEmitted::SIGNATURE_HASH, AaveKind::VoteEmitted),
    (AaveGovernanceToken::DelegateChanged::SIGNATURE_HASH, AaveKind::DelegateChanged),
    (AaveGovernanceToken::DelegatedPowerChanged::SIGNATURE_HASH, AaveKind::DelegatedPowerChanged),
    (AaveGovernanceToken::Transfer::SIGNATURE_HASH, AaveKind::Transfer),
    (AaveGovernanceToken::Approval::SIGNATURE_HASH, AaveKind::Approval),
];

/// `getProposalState()` of an Aave proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalState {
    Pending,
    Canceled,
    Active,
    Failed,
    Succeeded,
    Queued,
    Expired,
    Executed,
}

impl ProposalState {
    pub fn from_u8(v: u8) -> Result<Self> {
        Ok(match v {
            0 => Self::Pending,
            1 => Self::Canceled,
            2 => Self::Active,
            3 => Self::Failed,
            4 => Self::Succeeded,
            5 => Self::Queued,
            6 => Self::Expired,
            7 => Self::Executed,
            other => return Err(Error::Decode(format!("unknown proposal state {other}"))),
        })
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Canceled | Self::Failed | Self::Expired | Self::Executed)
    }
}

/// Governance and token events. Which contract emitted a log does not
/// matter; topics alone select the kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct AaveProtocol;

impl AaveProtocol {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContractProtocol for AaveProtocol {
    type Kind = AaveKind;

    fn network(&self) -> Network {
        Network::Aave
    }

    fn topics(&self) -> Vec<B256> {
        SIGNATURES.iter().map(|(topic, _)| *topic).collect()
    }

    fn classify(&self, log: &RawLog) -> Option<AaveKind> {
        let topic0 = log.topic0()?;
        SIGNATURES
            .iter()
            .find(|(topic, _)| *topic == topic0)
            .map(|(_, kind)| *kind)
    }

    async fn enrich(&self, chain: &str, block: u64, log: &RawLog, kind: AaveKind) -> Result<Option<CanonicalEvent>> {
        enrich_log(chain, block, log, kind)
            .map(Some)
            .map_err(|e| Error::enrich(kind, e.to_string()))
    }
}

fn enrich_log(chain: &str, block: u64, log: &RawLog, kind: AaveKind) -> Result<CanonicalEvent> {
    let token_address = || log.address.to_lowercase();
    let event = match kind {
        AaveKind::ProposalCreated => {
            let ev: AaveGovernanceV2::ProposalCreated = decode_log(log)?;
            let proposer = address(&ev.creator);
            CanonicalEvent::new(
                chain,
                block,
                AaveEvent::ProposalCreated {
                    id: to_u64(ev.id, "proposal id")?,
                    proposer: proposer.clone(),
                    executor: address(&ev.executor),
                    targets: addresses(&ev.targets),
                    values: decimals(&ev.values),
                    signatures: ev.signatures,
                    calldatas: ev.calldatas.iter().map(|c| hex_bytes(c)).collect(),
                    with_delegatecalls: ev.withDelegatecalls,
                    start_block: to_u64(ev.startBlock, "start block")?,
                    end_block: to_u64(ev.endBlock, "end block")?,
                    strategy: address(&ev.strategy),
                    ipfs_hash: hash(&ev.ipfsHash),
                },
            )
            .exclude(vec![proposer])
        }
        AaveKind::ProposalCanceled => {
            let ev: AaveGovernanceV2::ProposalCanceled = decode_log(log)?;
            CanonicalEvent::new(chain, block, AaveEvent::ProposalCanceled { id: to_u64(ev.id, "proposal id")? })
        }
        AaveKind::ProposalQueued => {
            let ev: AaveGovernanceV2::ProposalQueued = decode_log(log)?;
            CanonicalEvent::new(
                chain,
                block,
                AaveEvent::ProposalQueued {
                    id: to_u64(ev.id, "proposal id")?,
                    execution_time: to_u64(ev.executionTime, "execution time")?,
                },
            )
        }
        AaveKind::ProposalExecuted => {
            let ev: AaveGovernanceV2::ProposalExecuted = decode_log(log)?;
            CanonicalEvent::new(chain, block, AaveEvent::ProposalExecuted { id: to_u64(ev.id, "proposal id")? })
        }
        AaveKind::VoteEmitted => {
            let ev: AaveGovernanceV2::VoteEmitted = decode_log(log)?;
            let voter = address(&ev.voter);
            CanonicalEvent::new(
                chain,
                block,
                AaveEvent::VoteEmitted {
                    id: to_u64(ev.id, "proposal id")?,
                    voter: voter.clone(),
                    support: ev.support,
                    voting_power: ev.votingPower.to_string(),
                },
            )
            .exclude(vec![voter])
        }
        AaveKind::DelegateChanged => {
            let ev: AaveGovernanceToken::DelegateChanged = decode_log(log)?;
            let delegator = address(&ev.delegator);
            CanonicalEvent::new(
                chain,
                block,
                AaveEvent::DelegateChanged {
                    token_address: token_address(),
                    delegator: delegator.clone(),
                    delegatee: address(&ev.delegatee),
                    delegation_type: ev.delegationType,
                },
            )
            .exclude(vec![delegator])
        }
        AaveKind::DelegatedPowerChanged => {
            let ev: AaveGovernanceToken::DelegatedPowerChanged = decode_log(log)?;
            CanonicalEvent::new(
                chain,
                block,
                AaveEvent::DelegatedPowerChanged {
                    token_address: token_address(),
                    who: address(&ev.user),
                    amount: ev.amount.to_string(),
                    delegation_type: ev.delegationType,
                },
            )
        }
        AaveKind::Transfer => {
            let ev: AaveGovernanceToken::Transfer = decode_log(log)?;
            CanonicalEvent::new(
                chain,
                block,
                AaveEvent::Transfer {
                    token_address: token_address(),
                    from: address(&ev.from),
                    to: address(&ev.to),
                    amount: ev.value.to_string(),
                },
            )
        }
        AaveKind::Approval => {
            let ev: AaveGovernanceToken::Approval = decode_log(log)?;
            CanonicalEvent::new(
                chain,
                block,
                AaveEvent::Approval {
                    token_address: token_address(),
                    owner: address(&ev.owner),
                    spender: address(&ev.spender),
                    amount: ev.value.to_string(),
                },
            )
        }
    };
    Ok(event)
}

/// Rebuilds Aave proposal history from `getProposalById`.
pub struct AaveStorageFetcher {
    chain: String,
    client: Arc<dyn EvmRpcClient>,
    governance: String,
    span: tracing::Span,
}

impl AaveStorageFetcher {
    pub fn new(chain: &str, client: Arc<dyn EvmRpcClient>, governance: &str) -> Self {
        Self {
            chain: chain.to_string(),
            client,
            governance: governance.to_lowercase(),
            span: tracing::info_span!("storage", chain, network = "aave"),
        }
    }

    async fn count(&self) -> Result<u64> {
        let count = call(self.client.as_ref(), &self.governance, &AaveGovernanceV2::getProposalsCountCall {}).await?;
        to_u64(count._0, "proposal count")
    }

    async fn history(&self, id: u64, head: u64) -> Result<Option<ProposalHistory>> {
        let client = self.client.as_ref();
        let proposal_id = U256::from(id);
        let p = call(client, &self.governance, &AaveGovernanceV2::getProposalByIdCall { proposalId: proposal_id })
            .await?
            ._0;
        if p.creator == Address::ZERO {
            return Ok(None);
        }
        let state = ProposalState::from_u8(
            call(client, &self.governance, &AaveGovernanceV2::getProposalStateCall { proposalId: proposal_id })
                .await?
                ._0,
        )?;

        let start_block = to_u64(p.startBlock, "start block")?;
        let end_block = to_u64(p.endBlock, "end block")?;
        let execution_time = to_u64(p.executionTime, "execution time")?;
        let settled_at = end_block.min(head);

        let mut events = vec![CanonicalEvent::new(
            &self.chain,
            start_block,
            AaveEvent::ProposalCreated {
                id,
                proposer: address(&p.creator),
                executor: address(&p.executor),
                targets: addresses(&p.targets),
                values: decimals(&p.values),
                signatures: p.signatures,
                calldatas: p.calldatas.iter().map(|c| hex_bytes(c)).collect(),
                with_delegatecalls: p.withDelegatecalls,
                start_block,
                end_block,
                strategy: address(&p.strategy),
                ipfs_hash: hash(&p.ipfsHash),
            },
        )];
        match state {
            ProposalState::Canceled => {
                events.push(CanonicalEvent::new(&self.chain, settled_at, AaveEvent::ProposalCanceled { id }))
            }
            ProposalState::Queued => events.push(CanonicalEvent::new(
                &self.chain,
                settled_at,
                AaveEvent::ProposalQueued { id, execution_time },
            )),
            ProposalState::Executed => {
                events.push(CanonicalEvent::new(
                    &self.chain,
                    settled_at,
                    AaveEvent::ProposalQueued { id, execution_time },
                ));
                events.push(CanonicalEvent::new(&self.chain, settled_at, AaveEvent::ProposalExecuted { id }));
            }
            ProposalState::Pending
            | ProposalState::Active
            | ProposalState::Failed
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
impl StorageFetcher for AaveStorageFetcher {
    async fn fetch(
        &self,
        range: Option<&DisconnectedRange>,
        fetch_all_completed: bool,
    ) -> Result<Vec<CanonicalEvent>> {
        async {
            let head = self.client.block_number().await?;
            let count = self.count().await?;
            // Aave ids are zero-based.
            walk_newest_first((0..count).rev(), range, head, fetch_all_completed, |id| self.history(id, head)).await
        }
        .instrument(self.span.clone())
        .await
    }

    async fn fetch_one(&self, id: &str, entity: EntityKind) -> Result<Vec<CanonicalEvent>> {
        expect_entity(entity, EntityKind::AaveProposal)?;
        let index = parse_index(id)?;
        async {
            let head = self.client.block_number().await?;
            if index >= self.count().await? {
                tracing::warn!(id = index, "Proposal not found");
                return Ok(Vec::new());
            }
            Ok(self.history(index, head).await?.map(|h| h.events).unwrap_or_default())
        }
        .instrument(self.span.clone())
        .await
    }
}

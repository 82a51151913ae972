//! Moloch v1 DAOs.
//!
//! Moloch logs carry little beyond indexes and addresses, so enrichment
//! reads the proposal queue and member table. Storage recovery has no block
//! numbers to go on at all: proposal times are derived from the DAO's period
//! constants and mapped to blocks with [`BlockDater`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy_primitives::{B256, U256};
use alloy_sol_types::{sol, SolEvent};
use async_trait::async_trait;
use chainevents_core::payload::{MolochEvent, MolochKind};
use chainevents_core::{CanonicalEvent, DisconnectedRange, EntityKind, Error, Network, Result, StorageFetcher};
use tracing::Instrument;

use crate::abi::{address, call, decode_log, to_u64};
use crate::client::{EvmRpcClient, RawLog};
use crate::dater::BlockDater;
use crate::protocol::ContractProtocol;
use crate::protocols::{expect_entity, parse_index, walk_newest_first, ProposalHistory};

sol! {
    interface Moloch1 {
        event SubmitProposal(uint256 proposalIndex, address indexed delegateKey, address indexed memberAddress, address indexed applicant, uint256 tokenTribute, uint256 sharesRequested);
        event SubmitVote(uint256 indexed proposalIndex, address indexed delegateKey, address indexed memberAddress, uint8 uintVote);
        event ProcessProposal(uint256 indexed proposalIndex, address indexed applicant, address indexed memberAddress, uint256 tokenTribute, uint256 sharesRequested, bool didPass);
        event Ragequit(address indexed memberAddress, uint256 sharesToBurn);
        event Abort(uint256 indexed proposalIndex, address applicantAddress);
        event UpdateDelegateKey(address indexed memberAddress, address newDelegateKey);
        event SummonComplete(address indexed summoner, uint256 shares);

        function periodDuration() external view returns (uint256);
        function summoningTime() external view returns (uint256);
        function votingPeriodLength() external view returns (uint256);
        function gracePeriodLength() external view returns (uint256);
        function abortWindow() external view returns (uint256);
        function getProposalQueueLength() external view returns (uint256);
        function proposalQueue(uint256 index) external view returns (address proposer, address applicant, uint256 sharesRequested, uint256 startingPeriod, uint256 yesVotes, uint256 noVotes, bool processed, bool didPass, bool aborted, uint256 tokenTribute, string details, uint256 maxTotalSharesAtYesVote);
        function members(address member) external view returns (address delegateKey, uint256 shares, bool exists, uint256 highestIndexYesVote);
    }
}

const SIGNATURES: [(B256, MolochKind); 7] = [
    (Moloch1::SubmitProposal::SIGNATURE_HASH, MolochKind::SubmitProposal),
    (Moloch1::SubmitVote::SIGNATURE_HASH, MolochKind::SubmitVote),
    (Moloch1::ProcessProposal::SIGNATURE_HASH, MolochKind::ProcessProposal),
    (Moloch1::Ragequit::SIGNATURE_HASH, MolochKind::Ragequit),
    (Moloch1::Abort::SIGNATURE_HASH, MolochKind::Abort),
    (Moloch1::UpdateDelegateKey::SIGNATURE_HASH, MolochKind::UpdateDelegateKey),
    (Moloch1::SummonComplete::SIGNATURE_HASH, MolochKind::SummonComplete),
];

/// Period constants of one DAO, in seconds or periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MolochTiming {
    pub period_duration: u64,
    pub summoning_time: u64,
    pub voting_period: u64,
    pub grace_period: u64,
    pub abort_window: u64,
}

impl MolochTiming {
    pub async fn read(client: &dyn EvmRpcClient, dao: &str) -> Result<Self> {
        Ok(Self {
            period_duration: to_u64(call(client, dao, &Moloch1::periodDurationCall {}).await?._0, "period duration")?,
            summoning_time: to_u64(call(client, dao, &Moloch1::summoningTimeCall {}).await?._0, "summoning time")?,
            voting_period: to_u64(call(client, dao, &Moloch1::votingPeriodLengthCall {}).await?._0, "voting period")?,
            grace_period: to_u64(call(client, dao, &Moloch1::gracePeriodLengthCall {}).await?._0, "grace period")?,
            abort_window: to_u64(call(client, dao, &Moloch1::abortWindowCall {}).await?._0, "abort window")?,
        })
    }

    /// Unix time at which a proposal's voting opens.
    pub fn start_time(&self, starting_period: u64) -> u64 {
        starting_period
            .saturating_mul(self.period_duration)
            .saturating_add(self.summoning_time)
    }

    pub fn abort_deadline(&self, start_time: u64) -> u64 {
        start_time.saturating_add(self.abort_window.saturating_mul(self.period_duration))
    }

    /// Earliest time a proposal can be processed.
    pub fn process_time(&self, start_time: u64) -> u64 {
        let periods = self.voting_period.saturating_add(self.grace_period);
        start_time.saturating_add(periods.saturating_mul(self.period_duration))
    }
}

fn unix(seconds: u64) -> i64 {
    i64::try_from(seconds).unwrap_or(i64::MAX)
}

/// Moloch v1 events, enriched from contract storage.
pub struct MolochProtocol {
    client: Arc<dyn EvmRpcClient>,
    timings: Mutex<HashMap<String, MolochTiming>>,
}

impl MolochProtocol {
    pub fn new(client: Arc<dyn EvmRpcClient>) -> Self {
        Self {
            client,
            timings: Mutex::new(HashMap::new()),
        }
    }

    /// Period constants never change after summoning, so they are read once
    /// per DAO.
    async fn timing(&self, dao: &str) -> Result<MolochTiming> {
        let cached = self
            .timings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(dao)
            .copied();
        if let Some(timing) = cached {
            return Ok(timing);
        }
        let timing = MolochTiming::read(self.client.as_ref(), dao).await?;
        self.timings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(dao.to_string(), timing);
        Ok(timing)
    }

    async fn enrich_log(&self, chain: &str, block: u64, log: &RawLog, kind: MolochKind) -> Result<CanonicalEvent> {
        let dao = log.address.to_lowercase();
        let client = self.client.as_ref();
        let event = match kind {
            MolochKind::SubmitProposal => {
                let ev: Moloch1::SubmitProposal = decode_log(log)?;
                let proposal = call(client, &dao, &Moloch1::proposalQueueCall { index: ev.proposalIndex }).await?;
                let timing = self.timing(&dao).await?;
                let member = address(&ev.memberAddress);
                CanonicalEvent::new(
                    chain,
                    block,
                    MolochEvent::SubmitProposal {
                        proposal_index: to_u64(ev.proposalIndex, "proposal index")?,
                        delegate_key: address(&ev.delegateKey),
                        member: member.clone(),
                        applicant: address(&ev.applicant),
                        token_tribute: ev.tokenTribute.to_string(),
                        shares_requested: ev.sharesRequested.to_string(),
                        details: proposal.details,
                        start_time: timing.start_time(to_u64(proposal.startingPeriod, "starting period")?),
                    },
                )
                .exclude(vec![member])
            }
            MolochKind::SubmitVote => {
                let ev: Moloch1::SubmitVote = decode_log(log)?;
                let record = call(client, &dao, &Moloch1::membersCall { member: ev.memberAddress }).await?;
                let member = address(&ev.memberAddress);
                CanonicalEvent::new(
                    chain,
                    block,
                    MolochEvent::SubmitVote {
                        proposal_index: to_u64(ev.proposalIndex, "proposal index")?,
                        delegate_key: address(&ev.delegateKey),
                        member: member.clone(),
                        vote: ev.uintVote,
                        shares: record.shares.to_string(),
                        highest_index_yes_vote: to_u64(record.highestIndexYesVote, "highest yes vote")?,
                    },
                )
                .exclude(vec![member])
            }
            MolochKind::ProcessProposal => {
                let ev: Moloch1::ProcessProposal = decode_log(log)?;
                let proposal = call(client, &dao, &Moloch1::proposalQueueCall { index: ev.proposalIndex }).await?;
                CanonicalEvent::new(
                    chain,
                    block,
                    MolochEvent::ProcessProposal {
                        proposal_index: to_u64(ev.proposalIndex, "proposal index")?,
                        applicant: address(&ev.applicant),
                        member: address(&ev.memberAddress),
                        token_tribute: ev.tokenTribute.to_string(),
                        shares_requested: ev.sharesRequested.to_string(),
                        did_pass: ev.didPass,
                        yes_votes: proposal.yesVotes.to_string(),
                        no_votes: proposal.noVotes.to_string(),
                    },
                )
            }
            MolochKind::Ragequit => {
                let ev: Moloch1::Ragequit = decode_log(log)?;
                let member = address(&ev.memberAddress);
                CanonicalEvent::new(
                    chain,
                    block,
                    MolochEvent::Ragequit {
                        member: member.clone(),
                        shares_to_burn: ev.sharesToBurn.to_string(),
                    },
                )
                .exclude(vec![member])
            }
            MolochKind::Abort => {
                let ev: Moloch1::Abort = decode_log(log)?;
                CanonicalEvent::new(
                    chain,
                    block,
                    MolochEvent::Abort {
                        proposal_index: to_u64(ev.proposalIndex, "proposal index")?,
                        applicant: address(&ev.applicantAddress),
                    },
                )
            }
            MolochKind::UpdateDelegateKey => {
                let ev: Moloch1::UpdateDelegateKey = decode_log(log)?;
                CanonicalEvent::new(
                    chain,
                    block,
                    MolochEvent::UpdateDelegateKey {
                        member: address(&ev.memberAddress),
                        new_delegate_key: address(&ev.newDelegateKey),
                    },
                )
            }
            MolochKind::SummonComplete => {
                let ev: Moloch1::SummonComplete = decode_log(log)?;
                let timing = self.timing(&dao).await?;
                CanonicalEvent::new(
                    chain,
                    block,
                    MolochEvent::SummonComplete {
                        summoner: address(&ev.summoner),
                        shares: ev.shares.to_string(),
                        start_time: timing.summoning_time,
                    },
                )
            }
        };
        Ok(event)
    }
}

#[async_trait]
impl ContractProtocol for MolochProtocol {
    type Kind = MolochKind;

    fn network(&self) -> Network {
        Network::Moloch
    }

    fn topics(&self) -> Vec<B256> {
        SIGNATURES.iter().map(|(topic, _)| *topic).collect()
    }

    fn classify(&self, log: &RawLog) -> Option<MolochKind> {
        let topic0 = log.topic0()?;
        SIGNATURES
            .iter()
            .find(|(topic, _)| *topic == topic0)
            .map(|(_, kind)| *kind)
    }

    async fn enrich(&self, chain: &str, block: u64, log: &RawLog, kind: MolochKind) -> Result<Option<CanonicalEvent>> {
        self.enrich_log(chain, block, log, kind)
            .await
            .map(Some)
            .map_err(|e| Error::enrich(kind, e.to_string()))
    }
}

/// State shared by one storage walk.
struct Snapshot {
    timing: MolochTiming,
    head: u64,
    head_time: i64,
}

/// Rebuilds Moloch v1 proposal history from the proposal queue.
pub struct MolochStorageFetcher {
    chain: String,
    client: Arc<dyn EvmRpcClient>,
    dao: String,
    dater: BlockDater,
    span: tracing::Span,
}

impl MolochStorageFetcher {
    pub fn new(chain: &str, client: Arc<dyn EvmRpcClient>, dao: &str) -> Self {
        Self {
            chain: chain.to_string(),
            dater: BlockDater::new(client.clone()),
            client,
            dao: dao.to_lowercase(),
            span: tracing::info_span!("storage", chain, network = "moloch"),
        }
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let timing = MolochTiming::read(self.client.as_ref(), &self.dao).await?;
        let head = self.client.block_number().await?;
        let head_time = self
            .client
            .block(head)
            .await?
            .ok_or_else(|| Error::Rpc(format!("head block {head} not found")))?
            .timestamp;
        tracing::info!(head, head_time, "Current block");
        Ok(Snapshot {
            timing,
            head,
            head_time,
        })
    }

    async fn queue_length(&self) -> Result<u64> {
        let len = call(self.client.as_ref(), &self.dao, &Moloch1::getProposalQueueLengthCall {}).await?;
        to_u64(len._0, "queue length")
    }

    async fn history(&self, index: u64, snap: &Snapshot) -> Result<Option<ProposalHistory>> {
        let p = call(
            self.client.as_ref(),
            &self.dao,
            &Moloch1::proposalQueueCall { index: U256::from(index) },
        )
        .await?;
        tracing::debug!(index, "Fetched proposal from storage");

        let start_time = snap.timing.start_time(to_u64(p.startingPeriod, "starting period")?);
        let start_block = match self.dater.block_at(unix(start_time)).await {
            Ok(block) => block,
            Err(e) => {
                tracing::error!(index, start_time, error = %e, "Unable to date proposal, skipping");
                return Ok(None);
            }
        };

        let proposer = address(&p.proposer);
        let applicant = address(&p.applicant);
        let mut events = vec![CanonicalEvent::new(
            &self.chain,
            start_block,
            MolochEvent::SubmitProposal {
                proposal_index: index,
                delegate_key: proposer.clone(),
                member: proposer.clone(),
                applicant: applicant.clone(),
                token_tribute: p.tokenTribute.to_string(),
                shares_requested: p.sharesRequested.to_string(),
                details: p.details,
                start_time,
            },
        )];

        if p.aborted {
            let abort_time = unix(snap.timing.abort_deadline(start_time)).min(snap.head_time);
            let block = if abort_time == snap.head_time {
                tracing::info!(index, "Still in abort window, using current block");
                snap.head
            } else {
                self.date_or(abort_time, start_block + 1).await
            };
            events.push(CanonicalEvent::new(
                &self.chain,
                block,
                MolochEvent::Abort {
                    proposal_index: index,
                    applicant,
                },
            ));
        } else if p.processed {
            let process_time = unix(snap.timing.process_time(start_time));
            let block = self.date_or(process_time, start_block + 2).await;
            events.push(CanonicalEvent::new(
                &self.chain,
                block,
                MolochEvent::ProcessProposal {
                    proposal_index: index,
                    applicant,
                    member: proposer,
                    token_tribute: p.tokenTribute.to_string(),
                    shares_requested: p.sharesRequested.to_string(),
                    did_pass: p.didPass,
                    yes_votes: p.yesVotes.to_string(),
                    no_votes: p.noVotes.to_string(),
                },
            ));
        }

        Ok(Some(ProposalHistory {
            start_block,
            events,
            completed: p.aborted || p.processed,
        }))
    }

    /// Block at `timestamp`, or `fallback` when it cannot be resolved.
    async fn date_or(&self, timestamp: i64, fallback: u64) -> u64 {
        match self.dater.block_at(timestamp).await {
            Ok(block) => block,
            Err(e) => {
                tracing::error!(timestamp, error = %e, "Unable to resolve block for timestamp");
                fallback
            }
        }
    }
}

#[async_trait]
impl StorageFetcher for MolochStorageFetcher {
    async fn fetch(
        &self,
        range: Option<&DisconnectedRange>,
        fetch_all_completed: bool,
    ) -> Result<Vec<CanonicalEvent>> {
        async {
            let snap = self.snapshot().await?;
            let len = self.queue_length().await?;
            let snap = &snap;
            walk_newest_first((0..len).rev(), range, snap.head, fetch_all_completed, |index| {
                self.history(index, snap)
            })
            .await
        }
        .instrument(self.span.clone())
        .await
    }

    async fn fetch_one(&self, id: &str, entity: EntityKind) -> Result<Vec<CanonicalEvent>> {
        expect_entity(entity, EntityKind::MolochProposal)?;
        let index = parse_index(id)?;
        async {
            let snap = self.snapshot().await?;
            if index >= self.queue_length().await? {
                tracing::error!(index, "Proposal not found");
                return Ok(Vec::new());
            }
            Ok(self.history(index, &snap).await?.map(|h| h.events).unwrap_or_default())
        }
        .instrument(self.span.clone())
        .await
    }
}

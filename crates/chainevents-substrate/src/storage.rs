//! Synthesizes creation events for governance entities that are still live in
//! runtime storage, so a fresh listener can seed its history without
//! replaying the chain.
//!
//! Events are stamped with the current head, except preimages, which carry
//! the block they were noted at. Only entities storage still holds can be
//! recovered: closed proposals and tips are gone.

use std::sync::Arc;

use async_trait::async_trait;
use chainevents_core::payload::substrate::IdentityJudgement;
use chainevents_core::payload::{EventPayload, SubstrateEvent};
use chainevents_core::{
    sort_by_block, CanonicalEvent, DisconnectedRange, EntityKind, Error, FetchPlan, Result,
    StorageFetcher,
};
use futures::future::try_join_all;
use tracing::Instrument;

use crate::api::SubstrateApi;

type Events = Vec<CanonicalEvent>;

/// Storage fetcher for runtime-events chains.
#[derive(Clone)]
pub struct SubstrateStorageFetcher {
    inner: Arc<Inner>,
}

struct Inner {
    chain: String,
    api: Arc<dyn SubstrateApi>,
    span: tracing::Span,
}

impl SubstrateStorageFetcher {
    pub fn new(chain: &str, api: Arc<dyn SubstrateApi>) -> Self {
        Self {
            inner: Arc::new(Inner {
                chain: chain.to_string(),
                api,
                span: tracing::info_span!("storage", chain, network = "substrate"),
            }),
        }
    }

    /// Current identities of `addresses`, as `identity-set` events at the head.
    ///
    /// Addresses without a raw display name are skipped, as are judgements
    /// from registrars that no longer exist.
    pub async fn fetch_identities(&self, addresses: &[String]) -> Result<Events> {
        let inner = &self.inner;
        async {
            if !inner.api.has_module("identity") {
                tracing::info!("Identity module not detected");
                return Ok(Vec::new());
            }
            let head = inner.head().await?;
            let registrations =
                try_join_all(addresses.iter().map(|a| inner.api.identity_of(a))).await?;
            let registrars = inner.api.registrars().await?;

            let events = addresses
                .iter()
                .zip(registrations)
                .filter_map(|(who, registration)| {
                    let registration = registration?;
                    let display_name = registration.display?;
                    let judgements = registration
                        .judgements
                        .iter()
                        .filter_map(|(id, judgement)| {
                            let account = registrars.get(*id as usize).cloned().flatten()?;
                            Some((account, IdentityJudgement::from_runtime(judgement)))
                        })
                        .collect();
                    Some(inner.event(
                        head,
                        SubstrateEvent::IdentitySet {
                            who: who.clone(),
                            display_name,
                            judgements,
                        },
                    ))
                })
                .collect::<Events>();
            tracing::info!(found = events.len(), "Fetched identities");
            Ok(events)
        }
        .instrument(inner.span.clone())
        .await
    }
}

#[async_trait]
impl StorageFetcher for SubstrateStorageFetcher {
    /// `fetch_all_completed` has no effect here: storage only holds open entities.
    async fn fetch(&self, range: Option<&DisconnectedRange>, _fetch_all_completed: bool) -> Result<Events> {
        let span = self.inner.span.clone();
        async {
            let head = self.inner.head().await?;

            let proposals = self.inner.clone();
            let referenda = self.inner.clone();
            let preimages = self.inner.clone();
            let treasury = self.inner.clone();
            let tips = self.inner.clone();
            let stages = FetchPlan::new()
                .stage("democracy-proposals", &[], move |_| async move {
                    proposals.democracy_proposals(head, None).await
                })
                .stage("democracy-referenda", &[], move |_| async move {
                    referenda.democracy_referenda(head, None).await
                })
                .stage(
                    "democracy-preimages",
                    &["democracy-proposals", "democracy-referenda"],
                    move |inputs| async move {
                        let hashes = inputs
                            .iter()
                            .flat_map(|(_, events)| events.iter())
                            .filter_map(|ev| match &ev.data {
                                EventPayload::Substrate(SubstrateEvent::DemocracyProposed {
                                    proposal_hash,
                                    ..
                                })
                                | EventPayload::Substrate(SubstrateEvent::DemocracyStarted {
                                    proposal_hash,
                                    ..
                                }) => Some(proposal_hash.clone()),
                                _ => None,
                            })
                            .collect();
                        preimages.democracy_preimages(hashes).await
                    },
                )
                .stage("treasury-proposals", &[], move |_| async move {
                    treasury.treasury_proposals(head, None).await
                })
                .stage("tips", &[], move |_| async move { tips.tips(head, None).await })
                .run()
                .await?;

            let mut events: Events = stages
                .into_iter()
                .flat_map(|(_, events)| events)
                .filter(|ev| range.map_or(true, |r| r.contains(ev.block_number)))
                .collect();
            sort_by_block(&mut events);
            tracing::info!(events = events.len(), "Fetch complete");
            Ok(events)
        }
        .instrument(span)
        .await
    }

    async fn fetch_one(&self, id: &str, entity: EntityKind) -> Result<Events> {
        let inner = &self.inner;
        async {
            let head = inner.head().await?;
            let mut events = match entity {
                EntityKind::DemocracyPreimage => inner.democracy_preimages(vec![id.to_string()]).await?,
                EntityKind::DemocracyProposal => {
                    inner.democracy_proposals(head, Some(parse_index(id, entity)?)).await?
                }
                EntityKind::DemocracyReferendum => {
                    inner.democracy_referenda(head, Some(parse_index(id, entity)?)).await?
                }
                EntityKind::TreasuryProposal => {
                    inner.treasury_proposals(head, Some(parse_index(id, entity)?)).await?
                }
                EntityKind::TipProposal => inner.tips(head, Some(id)).await?,
                EntityKind::CompoundProposal | EntityKind::AaveProposal | EntityKind::MolochProposal => {
                    return Err(Error::Config(format!(
                        "'{entity}' is not a runtime-events entity"
                    )));
                }
            };
            sort_by_block(&mut events);
            Ok(events)
        }
        .instrument(inner.span.clone())
        .await
    }
}

fn parse_index(id: &str, entity: EntityKind) -> Result<u32> {
    id.parse()
        .map_err(|_| Error::Config(format!("invalid {entity} id '{id}'")))
}

impl Inner {
    async fn head(&self) -> Result<u64> {
        Ok(self.api.latest_header().await?.number)
    }

    fn event(&self, block: u64, data: SubstrateEvent) -> CanonicalEvent {
        CanonicalEvent::new(self.chain.as_str(), block, data)
    }

    async fn democracy_proposals(&self, head: u64, id: Option<u32>) -> Result<Events> {
        if !self.api.has_module("democracy") {
            return Ok(Vec::new());
        }
        tracing::info!("Fetching democracy proposals");
        let props: Vec<_> = self
            .api
            .public_props()
            .await?
            .into_iter()
            .filter(|p| id.map_or(true, |id| p.index == id))
            .collect();
        if let (Some(id), true) = (id, props.is_empty()) {
            tracing::error!(id, "Democracy proposal not found");
            return Ok(Vec::new());
        }

        let deposits = try_join_all(props.iter().map(|p| self.api.deposit_of(p.index))).await?;
        let events: Events = props
            .into_iter()
            .zip(deposits)
            .filter_map(|(prop, deposit)| {
                Some(self.event(
                    head,
                    SubstrateEvent::DemocracyProposed {
                        proposal_index: prop.index,
                        proposal_hash: prop.hash,
                        deposit: deposit?,
                        proposer: prop.proposer,
                    },
                ))
            })
            .collect();
        tracing::info!(found = events.len(), "Fetched democracy proposals");
        Ok(events)
    }

    async fn democracy_referenda(&self, head: u64, id: Option<u32>) -> Result<Events> {
        if !self.api.has_module("democracy") {
            tracing::info!("Democracy module not detected");
            return Ok(Vec::new());
        }
        tracing::info!("Fetching democracy referenda");

        let mut events: Events = self
            .api
            .active_referenda()
            .await?
            .into_iter()
            .map(|r| {
                self.event(
                    head,
                    SubstrateEvent::DemocracyStarted {
                        referendum_index: r.index,
                        proposal_hash: r.proposal_hash,
                        vote_threshold: r.threshold,
                        end_block: r.end,
                    },
                )
            })
            .collect();
        let active = events.len();

        // Passed referenda awaiting dispatch: threshold and end are no longer known.
        for entry in self.api.dispatch_queue().await? {
            events.push(self.event(
                head,
                SubstrateEvent::DemocracyStarted {
                    referendum_index: entry.index,
                    proposal_hash: entry.proposal_hash,
                    vote_threshold: String::new(),
                    end_block: 0,
                },
            ));
            events.push(self.event(
                head,
                SubstrateEvent::DemocracyPassed {
                    referendum_index: entry.index,
                    dispatch_block: Some(entry.at),
                },
            ));
        }

        if let Some(id) = id {
            events.retain(|ev| ev.entity().is_some_and(|e| e.id == id.to_string()));
            if events.is_empty() {
                tracing::error!(id, "No referendum found");
            }
            return Ok(events);
        }
        tracing::info!(found = active, "Fetched democracy referenda");
        Ok(events)
    }

    async fn democracy_preimages(&self, hashes: Vec<String>) -> Result<Events> {
        if !self.api.has_module("democracy") {
            return Ok(Vec::new());
        }
        tracing::info!(hashes = hashes.len(), "Fetching preimages");
        let images = try_join_all(hashes.iter().map(|h| self.api.preimage(h))).await?;
        let events: Events = hashes
            .into_iter()
            .zip(images)
            .filter_map(|(proposal_hash, image)| {
                let image = image?;
                Some(self.event(
                    image.at,
                    SubstrateEvent::PreimageNoted {
                        proposal_hash,
                        noter: image.proposer,
                        preimage: image.call,
                    },
                ))
            })
            .collect();
        tracing::info!(found = events.len(), "Fetched preimages");
        Ok(events)
    }

    async fn treasury_proposals(&self, head: u64, id: Option<u32>) -> Result<Events> {
        if !self.api.has_module("treasury") {
            tracing::info!("Treasury module not detected");
            return Ok(Vec::new());
        }
        tracing::info!("Fetching treasury proposals");

        let indices: Vec<u32> = match id {
            Some(id) => vec![id],
            None => {
                let approvals = self.api.treasury_approvals().await?;
                let count = self.api.treasury_proposal_count().await?;
                (0..count).filter(|i| !approvals.contains(i)).collect()
            }
        };
        let proposals =
            try_join_all(indices.iter().map(|i| self.api.treasury_proposal(*i))).await?;
        let events: Events = indices
            .into_iter()
            .zip(proposals)
            .filter_map(|(proposal_index, proposal)| {
                let p = proposal?;
                Some(self.event(
                    head,
                    SubstrateEvent::TreasuryProposed {
                        proposal_index,
                        proposer: p.proposer,
                        value: p.value,
                        beneficiary: p.beneficiary,
                        bond: p.bond,
                    },
                ))
            })
            .collect();
        if let (Some(id), true) = (id, events.is_empty()) {
            tracing::error!(id, "No treasury proposal found");
        }
        tracing::info!(found = events.len(), "Fetched treasury proposals");
        Ok(events)
    }

    /// `new-tip` per open tip, then one `tip-voted` per vote and `tip-closing`
    /// once the tip has a closing block. A tip that fails to load is skipped.
    async fn tips(&self, head: u64, only: Option<&str>) -> Result<Events> {
        if !self.api.has_module("tips") {
            tracing::info!("Tips module not detected");
            return Ok(Vec::new());
        }
        tracing::info!("Fetching tips");

        let mut events = Vec::new();
        let mut open = 0;
        for hash in self.api.open_tip_hashes().await? {
            if only.is_some_and(|h| h != hash) {
                continue;
            }
            let tip = match self.api.tip(&hash).await {
                Ok(Some(tip)) => tip,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(tip = %hash, error = %e, "Unable to fetch tip");
                    continue;
                }
            };
            open += 1;
            events.push(self.event(
                head,
                SubstrateEvent::NewTip {
                    proposal_hash: hash.clone(),
                    reason: crate::args::hex_to_utf8(&tip.reason),
                    who: tip.who,
                    finder: tip.finder,
                    deposit: tip.deposit,
                    finders_fee: tip.finders_fee,
                },
            ));
            for (who, value) in tip.tips {
                events.push(self.event(
                    head,
                    SubstrateEvent::TipVoted {
                        proposal_hash: hash.clone(),
                        who,
                        value,
                    },
                ));
            }
            if let Some(closing) = tip.closes {
                events.push(self.event(
                    head,
                    SubstrateEvent::TipClosing {
                        proposal_hash: hash.clone(),
                        closing,
                    },
                ));
            }
        }
        tracing::info!(found = open, "Fetched open tips");
        Ok(events)
    }
}

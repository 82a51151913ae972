//! The runtime client seam.
//!
//! [`SubstrateApi`] is what every component of this crate talks to. Block
//! access and the new-heads stream are required; storage queries default to
//! [`Error::Unsupported`] so a client only implements what its runtime has.
//! Queries that take an `at` block hash read storage as of that block.

use std::collections::BTreeMap;
use std::future::Future;
use std::ops::RangeInclusive;
use std::sync::Arc;

use async_trait::async_trait;
use chainevents_core::payload::substrate::Exposure;
use chainevents_core::{Error, Result};
use tokio::sync::mpsc;

use crate::types::{
    Block, DispatchEntry, Header, OpenTip, Preimage, PublicProposal, ReferendumStatus,
    Registration, RuntimeVersion, TreasuryProposalInfo,
};

fn unsupported<T>(query: &str) -> Result<T> {
    Err(Error::Unsupported(query.to_string()))
}

/// A connected runtime-events chain client.
#[async_trait]
pub trait SubstrateApi: Send + Sync {
    // ── Blocks ───────────────────────────────────────────────────────────────

    async fn runtime_version(&self) -> Result<RuntimeVersion>;

    async fn latest_header(&self) -> Result<Header>;

    /// Hashes of the blocks in `range`, in order. A pruned node returns fewer
    /// hashes than requested.
    async fn block_hashes(&self, range: RangeInclusive<u64>) -> Result<Vec<String>>;

    /// A full block with decoded events and extrinsics.
    async fn block(&self, hash: &str) -> Result<Block>;

    /// Stream of new best headers. Dropping the receiver ends the stream.
    async fn subscribe_new_heads(&self) -> Result<mpsc::UnboundedReceiver<Header>>;

    /// Returns `true` if the runtime has the pallet `name` (e.g. `"tips"`).
    fn has_module(&self, name: &str) -> bool;

    // ── Balances, session, staking ───────────────────────────────────────────

    async fn total_issuance(&self) -> Result<u128> {
        unsupported("balances.totalIssuance")
    }

    async fn session_index(&self, _at: &str) -> Result<u32> {
        unsupported("session.currentIndex")
    }

    async fn session_validators(&self, _at: &str) -> Result<Vec<String>> {
        unsupported("session.validators")
    }

    async fn current_era(&self, _at: &str) -> Result<Option<u32>> {
        unsupported("staking.currentEra")
    }

    async fn active_era(&self) -> Result<u32> {
        unsupported("staking.activeEra")
    }

    /// Validators elected for the active era.
    async fn elected_validators(&self) -> Result<Vec<String>> {
        unsupported("staking.validators (derived)")
    }

    /// Stash keys of the stakers map for `era` (the next elected set).
    async fn eras_stakers_keys(&self, _at: &str, _era: u32) -> Result<Vec<String>> {
        unsupported("staking.erasStakers.keys")
    }

    /// Every stash that declared intent to validate.
    async fn validator_stashes(&self, _at: &str) -> Result<Vec<String>> {
        unsupported("staking.validators.keys")
    }

    async fn era_points(&self, _at: &str, _era: u32) -> Result<BTreeMap<String, u32>> {
        unsupported("staking.erasRewardPoints")
    }

    /// Commission of `validator`, in parts per billion.
    async fn validator_commission(&self, _at: &str, _era: u32, _validator: &str) -> Result<u32> {
        unsupported("staking.erasValidatorPrefs")
    }

    async fn payee(&self, _at: &str, _stash: &str) -> Result<String> {
        unsupported("staking.payee")
    }

    /// Controller bonded to `stash`.
    async fn bonded(&self, _at: &str, _stash: &str) -> Result<Option<String>> {
        unsupported("staking.bonded")
    }

    async fn exposure(&self, _at: &str, _era: u32, _validator: &str) -> Result<Exposure> {
        unsupported("staking.erasStakers")
    }

    /// Offenders of every report filed for `(kind, time_slot)`.
    async fn offence_offenders(&self, _kind: &str, _time_slot: &str) -> Result<Vec<String>> {
        unsupported("offences.reports")
    }

    // ── Democracy ────────────────────────────────────────────────────────────

    async fn public_props(&self) -> Result<Vec<PublicProposal>> {
        unsupported("democracy.publicProps")
    }

    /// Deposit locked behind a public proposal.
    async fn deposit_of(&self, _index: u32) -> Result<Option<String>> {
        unsupported("democracy.depositOf")
    }

    /// Status of a referendum, if it is still ongoing.
    async fn referendum_info(&self, _index: u32) -> Result<Option<ReferendumStatus>> {
        unsupported("democracy.referendumInfoOf")
    }

    async fn active_referenda(&self) -> Result<Vec<ReferendumStatus>> {
        unsupported("democracy.referendumsActive")
    }

    async fn dispatch_queue(&self) -> Result<Vec<DispatchEntry>> {
        unsupported("democracy.dispatchQueue")
    }

    async fn preimage(&self, _hash: &str) -> Result<Option<Preimage>> {
        unsupported("democracy.preimages")
    }

    // ── Treasury and tips ────────────────────────────────────────────────────

    async fn treasury_proposal(&self, _index: u32) -> Result<Option<TreasuryProposalInfo>> {
        unsupported("treasury.proposals")
    }

    async fn treasury_proposal_count(&self) -> Result<u32> {
        unsupported("treasury.proposalCount")
    }

    async fn treasury_approvals(&self) -> Result<Vec<u32>> {
        unsupported("treasury.approvals")
    }

    /// An open tip; its `reason` is the hex-encoded reason text.
    async fn tip(&self, _hash: &str) -> Result<Option<OpenTip>> {
        unsupported("tips.tips")
    }

    async fn open_tip_hashes(&self) -> Result<Vec<String>> {
        unsupported("tips.tips.keys")
    }

    // ── Elections ────────────────────────────────────────────────────────────

    /// Current council members, from whichever elections pallet is present.
    async fn election_members(&self) -> Result<Vec<String>> {
        unsupported("elections.members")
    }

    async fn election_rounds(&self) -> Result<u32> {
        unsupported("elections.electionRounds")
    }

    // ── Identity ─────────────────────────────────────────────────────────────

    async fn identity_of(&self, _who: &str) -> Result<Option<Registration>> {
        unsupported("identity.identityOf")
    }

    /// Registrar accounts by registrar index; `None` for removed registrars.
    async fn registrars(&self) -> Result<Vec<Option<String>>> {
        unsupported("identity.registrars")
    }
}

/// Opens a [`SubstrateApi`] for a node URL.
#[async_trait]
pub trait SubstrateApiFactory: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Arc<dyn SubstrateApi>>;
}

/// Adapter returned by [`api_factory_fn`].
pub struct FnApiFactory<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> SubstrateApiFactory for FnApiFactory<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn SubstrateApi>>> + Send,
{
    async fn connect(&self, url: &str) -> Result<Arc<dyn SubstrateApi>> {
        (self.f)(url.to_string()).await
    }
}

/// Wrap an async closure as a [`SubstrateApiFactory`].
pub fn api_factory_fn<F, Fut>(f: F) -> Arc<dyn SubstrateApiFactory>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn SubstrateApi>>> + Send + 'static,
{
    Arc::new(FnApiFactory { f })
}

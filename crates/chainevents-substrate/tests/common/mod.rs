//! In-memory runtime client shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chainevents_core::payload::substrate::{Exposure, PreimageCall};
use chainevents_core::{Error, Result};
use chainevents_substrate::{
    Block, DispatchEntry, Header, OpenTip, Preimage, PublicProposal, RawEvent, RawExtrinsic,
    ReferendumStatus, Registration, RuntimeVersion, SubstrateApi, TreasuryProposalInfo,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

pub fn hash_of(number: u64) -> String {
    format!("0x{number:064x}")
}

fn number_of(hash: &str) -> Result<u64> {
    u64::from_str_radix(hash.trim_start_matches("0x"), 16)
        .map_err(|e| Error::Rpc(format!("bad hash {hash}: {e}")))
}

pub fn header(number: u64) -> Header {
    Header {
        number,
        hash: hash_of(number),
        parent_hash: hash_of(number.saturating_sub(1)),
    }
}

pub fn event(section: &str, method: &str, data: Vec<Value>) -> RawEvent {
    RawEvent {
        section: section.into(),
        method: method.into(),
        data,
        type_names: Vec::new(),
    }
}

pub fn extrinsic(section: &str, method: &str, signer: &str, args: Vec<Value>, success: bool) -> RawExtrinsic {
    RawExtrinsic {
        section: section.into(),
        method: method.into(),
        signer: signer.into(),
        args,
        success,
    }
}

pub fn transfer(sender: &str, dest: &str, value: u128) -> RawEvent {
    event("balances", "Transfer", vec![json!(sender), json!(dest), json!(value.to_string())])
}

/// Storage contents; tests mutate this directly.
#[derive(Default)]
pub struct MockState {
    pub head: u64,
    /// Blocks below this height have no hash (pruned).
    pub pruned_below: u64,
    pub version: Option<RuntimeVersion>,
    pub modules: HashSet<&'static str>,
    pub block_events: HashMap<u64, Vec<RawEvent>>,
    pub block_extrinsics: HashMap<u64, Vec<RawExtrinsic>>,

    pub total_issuance: u128,
    pub session_index: u32,
    pub validators: Vec<String>,
    pub current_era: Option<u32>,
    pub stashes: Vec<String>,
    pub bonded: HashMap<String, String>,

    pub public_props: Vec<PublicProposal>,
    pub deposits: HashMap<u32, String>,
    pub referenda: Vec<ReferendumStatus>,
    pub dispatch_queue: Vec<DispatchEntry>,
    pub preimages: HashMap<String, Preimage>,
    pub treasury: BTreeMap<u32, TreasuryProposalInfo>,
    pub treasury_count: u32,
    pub approvals: Vec<u32>,
    pub tips: BTreeMap<String, OpenTip>,
    pub broken_tips: HashSet<String>,
    pub identities: HashMap<String, Registration>,
    pub registrars: Vec<Option<String>>,
    pub election_round: u32,
    pub members: Vec<String>,
}

#[derive(Default)]
pub struct MockApi {
    pub state: Mutex<MockState>,
    pub hash_requests: Mutex<Vec<(u64, u64)>>,
    pub issuance_queries: AtomicU32,
    pub heads: Mutex<Option<mpsc::UnboundedSender<Header>>>,
}

impl MockApi {
    pub fn new(head: u64) -> Arc<Self> {
        let api = Self::default();
        {
            let mut s = api.state.lock().unwrap();
            s.head = head;
            s.modules = ["democracy", "treasury", "tips", "identity"].into_iter().collect();
        }
        Arc::new(api)
    }

    pub fn with<F: FnOnce(&mut MockState)>(&self, f: F) {
        f(&mut self.state.lock().unwrap());
    }

    /// Announce a new head to the live subscription, if any.
    pub fn announce(&self, number: u64) -> bool {
        match self.heads.lock().unwrap().as_ref() {
            Some(tx) => tx.send(header(number)).is_ok(),
            None => false,
        }
    }

    pub fn hash_requests(&self) -> Vec<(u64, u64)> {
        self.hash_requests.lock().unwrap().clone()
    }
}

pub fn edgeware() -> RuntimeVersion {
    RuntimeVersion {
        spec_name: "edgeware".into(),
        spec_version: 36,
    }
}

pub fn preimage(at: u64, proposer: &str) -> Preimage {
    Preimage {
        at,
        proposer: proposer.into(),
        call: PreimageCall {
            section: "treasury".into(),
            method: "approveProposal".into(),
            args: vec!["3".into()],
        },
    }
}

#[async_trait]
impl SubstrateApi for MockApi {
    async fn runtime_version(&self) -> Result<RuntimeVersion> {
        Ok(self.state.lock().unwrap().version.clone().unwrap_or_else(edgeware))
    }

    async fn latest_header(&self) -> Result<Header> {
        Ok(header(self.state.lock().unwrap().head))
    }

    async fn block_hashes(&self, range: RangeInclusive<u64>) -> Result<Vec<String>> {
        self.hash_requests
            .lock()
            .unwrap()
            .push((*range.start(), *range.end()));
        let s = self.state.lock().unwrap();
        Ok(range
            .filter(|n| *n >= s.pruned_below && *n <= s.head)
            .map(hash_of)
            .collect())
    }

    async fn block(&self, hash: &str) -> Result<Block> {
        let number = number_of(hash)?;
        let s = self.state.lock().unwrap();
        Ok(Block {
            header: header(number),
            version: s.version.clone().unwrap_or_else(edgeware),
            events: s.block_events.get(&number).cloned().unwrap_or_default(),
            extrinsics: s.block_extrinsics.get(&number).cloned().unwrap_or_default(),
        })
    }

    async fn subscribe_new_heads(&self) -> Result<mpsc::UnboundedReceiver<Header>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.heads.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    fn has_module(&self, name: &str) -> bool {
        self.state.lock().unwrap().modules.contains(name)
    }

    async fn total_issuance(&self) -> Result<u128> {
        self.issuance_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().unwrap().total_issuance)
    }

    async fn session_index(&self, _at: &str) -> Result<u32> {
        Ok(self.state.lock().unwrap().session_index)
    }

    async fn session_validators(&self, _at: &str) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().validators.clone())
    }

    async fn current_era(&self, _at: &str) -> Result<Option<u32>> {
        Ok(self.state.lock().unwrap().current_era)
    }

    async fn eras_stakers_keys(&self, _at: &str, _era: u32) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().validators.clone())
    }

    async fn validator_stashes(&self, _at: &str) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().stashes.clone())
    }

    async fn era_points(&self, _at: &str, _era: u32) -> Result<BTreeMap<String, u32>> {
        let s = self.state.lock().unwrap();
        Ok(s.validators.iter().map(|v| (v.clone(), 20)).collect())
    }

    async fn validator_commission(&self, _at: &str, _era: u32, _validator: &str) -> Result<u32> {
        Ok(50_000_000)
    }

    async fn payee(&self, _at: &str, _stash: &str) -> Result<String> {
        Ok("Staked".into())
    }

    async fn bonded(&self, _at: &str, stash: &str) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().bonded.get(stash).cloned())
    }

    async fn exposure(&self, _at: &str, _era: u32, validator: &str) -> Result<Exposure> {
        Ok(Exposure {
            own: "100".into(),
            total: "150".into(),
            others: vec![chainevents_core::payload::substrate::IndividualExposure {
                who: format!("{validator}-nominator"),
                value: "50".into(),
            }],
        })
    }

    async fn public_props(&self) -> Result<Vec<PublicProposal>> {
        Ok(self.state.lock().unwrap().public_props.clone())
    }

    async fn deposit_of(&self, index: u32) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().deposits.get(&index).cloned())
    }

    async fn referendum_info(&self, index: u32) -> Result<Option<ReferendumStatus>> {
        let s = self.state.lock().unwrap();
        Ok(s.referenda.iter().find(|r| r.index == index).cloned())
    }

    async fn active_referenda(&self) -> Result<Vec<ReferendumStatus>> {
        Ok(self.state.lock().unwrap().referenda.clone())
    }

    async fn dispatch_queue(&self) -> Result<Vec<DispatchEntry>> {
        Ok(self.state.lock().unwrap().dispatch_queue.clone())
    }

    async fn preimage(&self, hash: &str) -> Result<Option<Preimage>> {
        Ok(self.state.lock().unwrap().preimages.get(hash).cloned())
    }

    async fn treasury_proposal(&self, index: u32) -> Result<Option<TreasuryProposalInfo>> {
        Ok(self.state.lock().unwrap().treasury.get(&index).cloned())
    }

    async fn treasury_proposal_count(&self) -> Result<u32> {
        Ok(self.state.lock().unwrap().treasury_count)
    }

    async fn treasury_approvals(&self) -> Result<Vec<u32>> {
        Ok(self.state.lock().unwrap().approvals.clone())
    }

    async fn tip(&self, hash: &str) -> Result<Option<OpenTip>> {
        let s = self.state.lock().unwrap();
        if s.broken_tips.contains(hash) {
            return Err(Error::Rpc(format!("cannot decode tip {hash}")));
        }
        Ok(s.tips.get(hash).cloned())
    }

    async fn open_tip_hashes(&self) -> Result<Vec<String>> {
        let s = self.state.lock().unwrap();
        Ok(s.tips.keys().chain(s.broken_tips.iter()).cloned().collect())
    }

    async fn election_members(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().members.clone())
    }

    async fn election_rounds(&self) -> Result<u32> {
        Ok(self.state.lock().unwrap().election_round)
    }

    async fn identity_of(&self, who: &str) -> Result<Option<Registration>> {
        Ok(self.state.lock().unwrap().identities.get(who).cloned())
    }

    async fn registrars(&self) -> Result<Vec<Option<String>>> {
        Ok(self.state.lock().unwrap().registrars.clone())
    }
}

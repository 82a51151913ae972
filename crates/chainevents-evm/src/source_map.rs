//! Which logs a listener cares about.

use std::collections::{BTreeSet, HashMap, HashSet};

use alloy_primitives::B256;
use chainevents_core::{Error, Result};

use crate::client::{LogFilter, RawLog};

/// Lowercase contract address → accepted event signatures.
///
/// Built once per initialization from the configured contract addresses and
/// the protocol's known events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSourceMap {
    sources: HashMap<String, HashSet<B256>>,
}

impl EventSourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every address accepts every topic in `topics`.
    pub fn for_contracts<S: AsRef<str>>(addresses: &[S], topics: &[B256]) -> Result<Self> {
        if addresses.is_empty() {
            return Err(Error::Config("contract chains need at least one contract address".into()));
        }
        let mut map = Self::new();
        for address in addresses {
            map.insert(address.as_ref(), topics.iter().copied());
        }
        Ok(map)
    }

    pub fn insert(&mut self, address: &str, topics: impl IntoIterator<Item = B256>) {
        self.sources
            .entry(address.to_lowercase())
            .or_default()
            .extend(topics);
    }

    /// Returns `true` if the log comes from a tracked contract with a tracked signature.
    pub fn matches(&self, log: &RawLog) -> bool {
        let Some(topics) = self.sources.get(&log.address.to_lowercase()) else {
            return false;
        };
        log.topic0().is_some_and(|t| topics.contains(&t))
    }

    /// Sorted tracked addresses.
    pub fn addresses(&self) -> Vec<String> {
        let sorted: BTreeSet<&String> = self.sources.keys().collect();
        sorted.into_iter().cloned().collect()
    }

    /// Union of tracked signatures, sorted.
    pub fn topics(&self) -> Vec<B256> {
        let sorted: BTreeSet<B256> = self.sources.values().flatten().copied().collect();
        sorted.into_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// `eth_getLogs` filter for `[from, to]` restricted to the tracked sources.
    pub fn filter(&self, from_block: u64, to_block: u64) -> LogFilter {
        LogFilter {
            from_block,
            to_block,
            addresses: self.addresses(),
            topics: self.topics(),
        }
    }
}

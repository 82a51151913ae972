//! In-memory JSON-RPC node shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use alloy_primitives::{address, Bytes, U256};
use alloy_sol_types::{sol, SolEvent};
use async_trait::async_trait;
use chainevents_core::{BlockSummary, Error, Result};
use chainevents_evm::{EvmRpcClient, LogFilter, RawLog};

sol! {
    event Transfer(address indexed from, address indexed to, uint256 value);
    event Approval(address indexed owner, address indexed spender, uint256 value);
}

pub const TOKEN: &str = "0x00000000000000000000000000000000000000cc";
pub const OTHER: &str = "0x00000000000000000000000000000000000000ee";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

pub fn transfer(contract: &str, block: u64, value: u64) -> RawLog {
    let data = Transfer {
        from: address!("00000000000000000000000000000000000000aa"),
        to: address!("00000000000000000000000000000000000000bb"),
        value: U256::from(value),
    }
    .encode_log_data();
    RawLog::new(contract, block, 0, data.topics(), &data.data)
}

pub fn approval(contract: &str, block: u64) -> RawLog {
    let data = Approval {
        owner: address!("00000000000000000000000000000000000000aa"),
        spender: address!("00000000000000000000000000000000000000bb"),
        value: U256::from(1u8),
    }
    .encode_log_data();
    RawLog::new(contract, block, 1, data.topics(), &data.data)
}

#[derive(Default)]
pub struct NodeState {
    pub head: u64,
    /// Seconds between blocks; zero mines every block at the same time.
    pub block_time: i64,
    pub logs: Vec<RawLog>,
    /// Returned by every `eth_getLogs`, whatever the filter.
    pub stray: Option<RawLog>,
    pub fail_logs: bool,
    /// Canned `eth_call` results by selector.
    pub calls: HashMap<[u8; 4], Bytes>,
}

pub struct MockNode {
    state: Mutex<NodeState>,
    pub log_requests: AtomicU32,
    pub block_requests: AtomicU32,
}

impl MockNode {
    pub fn new(head: u64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(NodeState {
                head,
                block_time: 12,
                ..Default::default()
            }),
            log_requests: AtomicU32::new(0),
            block_requests: AtomicU32::new(0),
        })
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut NodeState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }
}

#[async_trait]
impl EvmRpcClient for MockNode {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.with(|s| s.head))
    }

    async fn block(&self, number: u64) -> Result<Option<BlockSummary>> {
        self.block_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.with(|s| {
            (number <= s.head).then(|| BlockSummary {
                number,
                hash: format!("0x{number:064x}"),
                parent_hash: format!("0x{:064x}", number.saturating_sub(1)),
                timestamp: number as i64 * s.block_time,
            })
        }))
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>> {
        self.log_requests.fetch_add(1, Ordering::SeqCst);
        self.with(|s| {
            if s.fail_logs {
                return Err(Error::Rpc("eth_getLogs: upstream timeout".into()));
            }
            let mut out: Vec<RawLog> = s
                .logs
                .iter()
                .filter(|log| {
                    let block = log.block_number_u64().unwrap();
                    (filter.from_block..=filter.to_block).contains(&block)
                        && (filter.addresses.is_empty() || filter.addresses.contains(&log.address))
                })
                .cloned()
                .collect();
            out.extend(s.stray.clone());
            Ok(out)
        })
    }

    async fn call(&self, to: &str, data: Bytes) -> Result<Bytes> {
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| Error::Rpc("call data shorter than a selector".into()))?;
        self.with(|s| s.calls.get(&selector).cloned())
            .ok_or_else(|| Error::Unsupported(format!("eth_call {} to {to}", hex::encode(selector))))
    }
}

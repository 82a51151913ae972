//! Chain client abstraction for contract chains.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use chainevents_core::{BlockSummary, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A raw EVM log as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "blockHash", default)]
    pub block_hash: String,
    #[serde(rename = "transactionHash", default)]
    pub tx_hash: String,
    #[serde(rename = "logIndex", default)]
    pub log_index: String,
    #[serde(default)]
    pub removed: Option<bool>,
}

impl RawLog {
    /// Build a log from decoded parts.
    pub fn new(address: &str, block_number: u64, log_index: u32, topics: &[B256], data: &[u8]) -> Self {
        Self {
            address: address.to_lowercase(),
            topics: topics.iter().map(|t| format!("0x{}", hex::encode(t))).collect(),
            data: format!("0x{}", hex::encode(data)),
            block_number: format!("0x{block_number:x}"),
            block_hash: String::new(),
            tx_hash: String::new(),
            log_index: format!("0x{log_index:x}"),
            removed: None,
        }
    }

    pub fn block_number_u64(&self) -> Result<u64> {
        parse_hex_u64(&self.block_number)
    }

    /// Returns `true` if this log was removed by a reorg.
    pub fn is_removed(&self) -> bool {
        self.removed.unwrap_or(false)
    }

    /// The event signature hash, if the log has topics.
    pub fn topic0(&self) -> Option<B256> {
        self.topics.first().and_then(|t| B256::from_str(t).ok())
    }

    pub fn topic_hashes(&self) -> Result<Vec<B256>> {
        self.topics
            .iter()
            .map(|t| B256::from_str(t).map_err(|e| Error::Decode(format!("topic {t}: {e}"))))
            .collect()
    }

    pub fn data_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(self.data.trim_start_matches("0x"))
            .map_err(|e| Error::Decode(format!("log data: {e}")))
    }
}

/// Address and topic0 restriction for `eth_getLogs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub from_block: u64,
    pub to_block: u64,
    /// Lowercase contract addresses; empty = any.
    pub addresses: Vec<String>,
    /// Accepted event signatures (OR); empty = any.
    pub topics: Vec<B256>,
}

impl LogFilter {
    /// The `eth_getLogs` parameter object.
    pub fn to_json(&self) -> Value {
        let mut filter = json!({
            "fromBlock": format!("0x{:x}", self.from_block),
            "toBlock": format!("0x{:x}", self.to_block),
        });
        if !self.addresses.is_empty() {
            filter["address"] = json!(self.addresses);
        }
        if !self.topics.is_empty() {
            let topics: Vec<String> = self
                .topics
                .iter()
                .map(|t| format!("0x{}", hex::encode(t)))
                .collect();
            filter["topics"] = json!([topics]);
        }
        filter
    }
}

/// Fetches EVM data from a JSON-RPC provider.
#[async_trait]
pub trait EvmRpcClient: Send + Sync {
    async fn block_number(&self) -> Result<u64>;

    /// `None` if the node does not know the block.
    async fn block(&self, number: u64) -> Result<Option<BlockSummary>>;

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<RawLog>>;

    /// `eth_call` against `to` at the latest block.
    async fn call(&self, to: &str, data: Bytes) -> Result<Bytes>;
}

/// Opens an [`EvmRpcClient`] for a node URL.
#[async_trait]
pub trait EvmClientFactory: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Arc<dyn EvmRpcClient>>;
}

/// Adapter returned by [`client_factory_fn`].
pub struct FnClientFactory<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> EvmClientFactory for FnClientFactory<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn EvmRpcClient>>> + Send,
{
    async fn connect(&self, url: &str) -> Result<Arc<dyn EvmRpcClient>> {
        (self.f)(url.to_string()).await
    }
}

/// Wrap an async closure as an [`EvmClientFactory`].
pub fn client_factory_fn<F, Fut>(f: F) -> Arc<dyn EvmClientFactory>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn EvmRpcClient>>> + Send + 'static,
{
    Arc::new(FnClientFactory { f })
}

/// Parse a hex-encoded quantity (with or without `0x`).
pub fn parse_hex_u64(s: &str) -> Result<u64> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| Error::Decode(format!("quantity '{s}': {e}")))
}

/// Convert an `eth_getBlockByNumber` response into a [`BlockSummary`].
pub fn block_from_json(v: &Value) -> Result<Option<BlockSummary>> {
    if v.is_null() {
        return Ok(None);
    }
    let field = |name: &str| {
        v[name]
            .as_str()
            .ok_or_else(|| Error::Decode(format!("block field '{name}' missing")))
    };
    let timestamp = parse_hex_u64(field("timestamp")?)?;
    Ok(Some(BlockSummary {
        number: parse_hex_u64(field("number")?)?,
        hash: field("hash")?.to_string(),
        parent_hash: field("parentHash")?.to_string(),
        timestamp: i64::try_from(timestamp)
            .map_err(|_| Error::Decode(format!("timestamp {timestamp} out of range")))?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_quantities() {
        assert_eq!(parse_hex_u64("0x1").unwrap(), 1);
        assert_eq!(parse_hex_u64("0xff").unwrap(), 255);
        assert_eq!(parse_hex_u64("1234").unwrap(), 0x1234);
        assert!(parse_hex_u64("0xzz").is_err());
    }

    #[test]
    fn raw_log_accessors() {
        let topic = B256::repeat_byte(0xab);
        let log = RawLog::new("0xABCDEF0000000000000000000000000000000001", 5_000_000_000, 5, &[topic], &[1, 2]);
        assert_eq!(log.address, "0xabcdef0000000000000000000000000000000001");
        assert_eq!(log.block_number, "0x12a05f200");
        assert_eq!(log.block_number_u64().unwrap(), 5_000_000_000);
        assert_eq!(log.topic0(), Some(topic));
        assert_eq!(log.data_bytes().unwrap(), vec![1, 2]);
        assert!(!log.is_removed());
    }

    #[test]
    fn raw_log_deserializes_node_shape() {
        let log: RawLog = serde_json::from_value(json!({
            "address": "0x1",
            "topics": [],
            "data": "0x",
            "blockNumber": "0x10",
            "blockHash": "0xaa",
            "transactionHash": "0xbb",
            "logIndex": "0x0",
            "removed": true
        }))
        .unwrap();
        assert_eq!(log.block_number_u64().unwrap(), 16);
        assert!(log.is_removed());
        assert!(log.topic0().is_none());
    }

    #[test]
    fn filter_json_nests_topic_alternatives() {
        let filter = LogFilter {
            from_block: 16,
            to_block: 31,
            addresses: vec!["0xabc".into()],
            topics: vec![B256::ZERO, B256::repeat_byte(1)],
        };
        let json = filter.to_json();
        assert_eq!(json["fromBlock"], "0x10");
        assert_eq!(json["toBlock"], "0x1f");
        assert_eq!(json["address"][0], "0xabc");
        assert_eq!(json["topics"][0].as_array().unwrap().len(), 2);
    }

    #[test]
    fn block_json_conversion() {
        let block = block_from_json(&json!({
            "number": "0x64",
            "hash": "0x01",
            "parentHash": "0x00",
            "timestamp": "0x5f5e100",
        }))
        .unwrap()
        .unwrap();
        assert_eq!(block.number, 100);
        assert_eq!(block.timestamp, 100_000_000);
        assert!(block_from_json(&Value::Null).unwrap().is_none());
    }
}

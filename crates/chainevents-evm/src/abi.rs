//! ABI helpers shared by the contract protocols.
//!
//! Contract interfaces are declared with `alloy_sol_types::sol!` in each
//! protocol module; this module decodes logs against them, performs typed
//! `eth_call`s, and renders decoded values the way canonical payloads expect
//! (lowercase `0x` addresses, decimal quantities).

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use chainevents_core::{Error, Result};

use crate::client::{EvmRpcClient, RawLog};

/// Decode `log` as event `E`.
pub fn decode_log<E: SolEvent>(log: &RawLog) -> Result<E> {
    let topics = log.topic_hashes()?;
    let data = log.data_bytes()?;
    E::decode_raw_log(topics, &data, true)
        .map_err(|e| Error::Decode(format!("{}: {e}", E::SIGNATURE)))
}

/// Typed `eth_call` of `call` against contract `to`.
pub async fn call<C: SolCall + Sync>(client: &dyn EvmRpcClient, to: &str, call: &C) -> Result<C::Return> {
    let out = client.call(to, Bytes::from(call.abi_encode())).await?;
    // Lenient: governor versions append fields past the declared prefix.
    C::abi_decode_returns(&out, false).map_err(|e| Error::Decode(format!("{}: {e}", C::SIGNATURE)))
}

/// Lowercase `0x`-prefixed address.
pub fn address(a: &Address) -> String {
    format!("0x{}", hex::encode(a.as_slice()))
}

pub fn addresses(list: &[Address]) -> Vec<String> {
    list.iter().map(address).collect()
}

/// `0x`-prefixed hex of raw bytes.
pub fn hex_bytes(b: &[u8]) -> String {
    format!("0x{}", hex::encode(b))
}

pub fn hash(h: &B256) -> String {
    hex_bytes(h.as_slice())
}

pub fn decimals(list: &[U256]) -> Vec<String> {
    list.iter().map(U256::to_string).collect()
}

/// Narrow an on-chain integer to `u64`.
pub fn to_u64(value: U256, what: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::Decode(format!("{what} {value} does not fit in u64")))
}

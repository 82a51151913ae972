//! Block-by-timestamp search.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chainevents_core::{Error, Result};

use crate::client::EvmRpcClient;

/// Cached timestamps kept before the cache is reset. One search reads about
/// `log2(head)` blocks, so this spans dozens of searches.
const MAX_CACHED: usize = 1_024;

/// Finds the block closest to a unix timestamp by binary search over block
/// timestamps. Timestamps already read are cached, up to [`MAX_CACHED`].
pub struct BlockDater {
    client: Arc<dyn EvmRpcClient>,
    timestamps: Mutex<HashMap<u64, i64>>,
}

impl BlockDater {
    pub fn new(client: Arc<dyn EvmRpcClient>) -> Self {
        Self {
            client,
            timestamps: Mutex::new(HashMap::new()),
        }
    }

    async fn timestamp(&self, number: u64) -> Result<i64> {
        if let Some(ts) = self.cache().get(&number) {
            return Ok(*ts);
        }
        let block = self
            .client
            .block(number)
            .await?
            .ok_or_else(|| Error::Rpc(format!("block {number} not found")))?;
        let mut cache = self.cache();
        if cache.len() >= MAX_CACHED {
            cache.clear();
        }
        cache.insert(number, block.timestamp);
        Ok(block.timestamp)
    }

    /// The first block whose timestamp is at or after `timestamp`, clamped to
    /// `[0, head]`.
    pub async fn block_at(&self, timestamp: i64) -> Result<u64> {
        let head = self.client.block_number().await?;
        if self.timestamp(head).await? <= timestamp {
            return Ok(head);
        }
        let (mut lo, mut hi) = (0u64, head);
        // invariant: timestamp(hi) > timestamp, answer in [lo, hi]
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.timestamp(mid).await? >= timestamp {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        tracing::debug!(timestamp, block = lo, "Resolved block for timestamp");
        Ok(lo)
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<u64, i64>> {
        self.timestamps.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;
    use async_trait::async_trait;
    use chainevents_core::BlockSummary;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::client::{LogFilter, RawLog};

    /// Block `n` is mined at `n * 13` seconds.
    struct Chain {
        head: u64,
        reads: AtomicU32,
    }

    #[async_trait]
    impl EvmRpcClient for Chain {
        async fn block_number(&self) -> Result<u64> {
            Ok(self.head)
        }

        async fn block(&self, number: u64) -> Result<Option<BlockSummary>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok((number <= self.head).then(|| BlockSummary {
                number,
                hash: String::new(),
                parent_hash: String::new(),
                timestamp: number as i64 * 13,
            }))
        }

        async fn logs(&self, _filter: &LogFilter) -> Result<Vec<RawLog>> {
            Ok(Vec::new())
        }

        async fn call(&self, _to: &str, _data: Bytes) -> Result<Bytes> {
            Err(Error::Unsupported("eth_call".into()))
        }
    }

    fn dater(head: u64) -> (Arc<Chain>, BlockDater) {
        let chain = Arc::new(Chain {
            head,
            reads: AtomicU32::new(0),
        });
        (chain.clone(), BlockDater::new(chain))
    }

    #[tokio::test]
    async fn exact_and_between_timestamps() {
        let (_, dater) = dater(1_000);
        assert_eq!(dater.block_at(13 * 400).await.unwrap(), 400);
        // Between 400 and 401: first block at or after.
        assert_eq!(dater.block_at(13 * 400 + 5).await.unwrap(), 401);
    }

    #[tokio::test]
    async fn clamps_to_genesis_and_head() {
        let (_, dater) = dater(1_000);
        assert_eq!(dater.block_at(-50).await.unwrap(), 0);
        assert_eq!(dater.block_at(i64::MAX).await.unwrap(), 1_000);
    }

    #[tokio::test]
    async fn repeated_lookups_hit_the_cache() {
        let (chain, dater) = dater(1 << 20);
        dater.block_at(13 * 777).await.unwrap();
        let first = chain.reads.load(Ordering::SeqCst);
        assert!(first <= 22);
        dater.block_at(13 * 777).await.unwrap();
        assert_eq!(chain.reads.load(Ordering::SeqCst), first);
    }

    #[tokio::test]
    async fn cache_stays_bounded() {
        let (_, dater) = dater(1 << 20);
        for i in 0..500i64 {
            let block = dater.block_at(13 * (i * 2_003 + 1)).await.unwrap();
            assert_eq!(block, (i * 2_003 + 1) as u64);
            assert!(dater.cache().len() <= MAX_CACHED);
        }
    }
}

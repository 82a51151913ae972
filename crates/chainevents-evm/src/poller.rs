//! Historical log fetch.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use async_trait::async_trait;
use chainevents_core::{BlockChunks, DisconnectedRange, Error, EventPoller, RawItem, Result};
use futures::{StreamExt, TryStreamExt};
use tracing::Instrument;

use crate::client::{EvmRpcClient, RawLog};
use crate::source_map::EventSourceMap;

/// `eth_getLogs` requests in flight during a poll.
const CHUNK_FETCH_CONCURRENCY: usize = 4;

/// Every tracked log of one block, in node order.
#[derive(Debug, Clone, PartialEq)]
pub struct LogBatch {
    pub block_number: u64,
    pub logs: Vec<RawLog>,
}

impl RawItem for LogBatch {
    fn block_number(&self) -> u64 {
        self.block_number
    }
}

/// Fetch tracked logs in `range` and group them into ascending per-block batches.
///
/// A log outside the requested range is a node protocol violation. Logs
/// removed by a reorg and logs the source map does not track are dropped.
pub(crate) async fn fetch_batches(
    client: &dyn EvmRpcClient,
    sources: &EventSourceMap,
    range: RangeInclusive<u64>,
) -> Result<Vec<LogBatch>> {
    let filter = sources.filter(*range.start(), *range.end());
    let logs = client.logs(&filter).await?;

    let mut by_block: BTreeMap<u64, Vec<RawLog>> = BTreeMap::new();
    for log in logs {
        let block = log.block_number_u64()?;
        if !range.contains(&block) {
            return Err(Error::Rpc(format!(
                "node returned a log for block {block} outside {}..={}",
                range.start(),
                range.end()
            )));
        }
        if log.is_removed() || !sources.matches(&log) {
            continue;
        }
        by_block.entry(block).or_default().push(log);
    }

    Ok(by_block
        .into_iter()
        .map(|(block_number, logs)| LogBatch { block_number, logs })
        .collect())
}

/// Polls `eth_getLogs` over a block range in chunks, returning batches oldest first.
///
/// Any chunk failure fails the whole poll.
pub struct LogPoller {
    client: Arc<dyn EvmRpcClient>,
    sources: Arc<EventSourceMap>,
    span: tracing::Span,
}

impl LogPoller {
    pub fn new(chain: &str, client: Arc<dyn EvmRpcClient>, sources: Arc<EventSourceMap>) -> Self {
        Self {
            client,
            sources,
            span: tracing::info_span!("poller", chain, network = "evm"),
        }
    }
}

#[async_trait]
impl EventPoller<LogBatch> for LogPoller {
    async fn head(&self) -> Result<u64> {
        self.client.block_number().await
    }

    async fn poll(&self, range: &DisconnectedRange, chunk_size: u64) -> Result<Vec<LogBatch>> {
        async {
            let end = match range.end_block {
                Some(end) => end,
                None => self.head().await?,
            };
            let start = range.start_block;
            if start > end {
                tracing::error!(start, end, "Poll range start is after its end");
                return Ok(Vec::new());
            }

            let client = self.client.as_ref();
            let sources = self.sources.as_ref();
            let chunks: Vec<Vec<LogBatch>> = futures::stream::iter(BlockChunks::new(start, end, chunk_size))
                .map(|chunk| async move {
                    let (from, to) = (*chunk.start(), *chunk.end());
                    let fetched = fetch_batches(client, sources, chunk).await.map_err(|e| {
                        tracing::error!(from, to, error = %e, "Log chunk failed");
                        e
                    })?;
                    tracing::debug!(from, to, batches = fetched.len(), "Fetched chunk");
                    Ok::<_, Error>(fetched)
                })
                .buffered(CHUNK_FETCH_CONCURRENCY)
                .try_collect()
                .await?;
            let batches: Vec<LogBatch> = chunks.into_iter().flatten().collect();
            tracing::info!(start, end, batches = batches.len(), "Poll complete");
            Ok(batches)
        }
        .instrument(self.span.clone())
        .await
    }
}

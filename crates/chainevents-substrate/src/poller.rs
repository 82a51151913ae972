//! Historical block fetch.

use std::sync::Arc;

use async_trait::async_trait;
use chainevents_core::{BlockChunks, DisconnectedRange, Error, EventPoller, Result};
use futures::{StreamExt, TryStreamExt};
use tracing::Instrument;

use crate::api::SubstrateApi;
use crate::types::Block;

/// Blocks fetched concurrently within a chunk.
const BLOCK_FETCH_CONCURRENCY: usize = 8;

/// Fetches blocks by range: hashes in bulk per chunk, then each block by hash.
///
/// A chunk that comes back short means the node has pruned that history.
/// That fails the poll unless it is the final chunk, whose tail may simply
/// not exist yet.
pub struct SubstratePoller {
    api: Arc<dyn SubstrateApi>,
    archival: bool,
    span: tracing::Span,
}

impl SubstratePoller {
    pub fn new(chain: &str, api: Arc<dyn SubstrateApi>, archival: bool) -> Self {
        Self {
            api,
            archival,
            span: tracing::info_span!("poller", chain, network = "substrate"),
        }
    }

    async fn fetch_chunk(&self, chunk: std::ops::RangeInclusive<u64>, is_final: bool) -> Result<Vec<Block>> {
        let (start, end) = (*chunk.start(), *chunk.end());
        let requested = usize::try_from(end - start + 1).unwrap_or(usize::MAX);
        let mut hashes = self.api.block_hashes(chunk).await?;

        if hashes.len() < requested {
            if !is_final {
                tracing::error!(
                    start,
                    end,
                    requested,
                    received = hashes.len(),
                    archival = self.archival,
                    "Block hashes missing, node appears pruned"
                );
                return Err(Error::PrunedRange {
                    start,
                    end,
                    requested,
                    received: hashes.len(),
                });
            }
            tracing::warn!(start, end, requested, received = hashes.len(), "Final chunk short");
        }
        hashes.truncate(requested);

        let api = &self.api;
        futures::stream::iter(hashes)
            .map(|hash| async move { api.block(&hash).await })
            .buffered(BLOCK_FETCH_CONCURRENCY)
            .try_collect()
            .await
    }
}

#[async_trait]
impl EventPoller<Block> for SubstratePoller {
    async fn head(&self) -> Result<u64> {
        Ok(self.api.latest_header().await?.number)
    }

    async fn poll(&self, range: &DisconnectedRange, chunk_size: u64) -> Result<Vec<Block>> {
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

            let mut blocks = Vec::new();
            for chunk in BlockChunks::new(start, end, chunk_size) {
                let is_final = *chunk.end() == end;
                let fetched = self.fetch_chunk(chunk, is_final).await?;
                tracing::debug!(blocks = fetched.len(), "Fetched chunk");
                blocks.extend(fetched);
            }
            tracing::info!(start, end, blocks = blocks.len(), "Poll complete");
            Ok(blocks)
        }
        .instrument(self.span.clone())
        .await
    }
}

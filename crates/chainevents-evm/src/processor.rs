//! Log batch → canonical events.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chainevents_core::{CanonicalEvent, EventProcessor};
use tracing::Instrument;

use crate::poller::LogBatch;
use crate::protocol::ContractProtocol;

/// Runs every log of a batch through a [`ContractProtocol`].
pub struct EvmProcessor<P> {
    chain: String,
    protocol: P,
    /// Highest processed block plus one; zero until the first batch.
    last_block: AtomicU64,
    span: tracing::Span,
}

impl<P: ContractProtocol> EvmProcessor<P> {
    pub fn new(chain: &str, protocol: P) -> Self {
        let network = protocol.network();
        Self {
            chain: chain.to_string(),
            protocol,
            last_block: AtomicU64::new(0),
            span: tracing::info_span!("processor", chain, network = %network),
        }
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }
}

#[async_trait]
impl<P: ContractProtocol> EventProcessor<LogBatch> for EvmProcessor<P> {
    async fn process(&self, batch: &LogBatch) -> Vec<CanonicalEvent> {
        let number = batch.block_number;
        self.last_block
            .fetch_max(number.saturating_add(1), Ordering::SeqCst);

        async {
            let mut out = Vec::new();
            for log in &batch.logs {
                if log.is_removed() {
                    tracing::debug!(block = number, address = %log.address, "Skipping removed log");
                    continue;
                }
                let Some(kind) = self.protocol.classify(log) else {
                    tracing::trace!(block = number, address = %log.address, "Skipping untracked log");
                    continue;
                };
                match self.protocol.enrich(&self.chain, number, log, kind).await {
                    Ok(Some(ev)) => out.push(ev),
                    Ok(None) => tracing::trace!(block = number, kind = %kind, "Log filtered by protocol"),
                    Err(e) => tracing::warn!(
                        block = number,
                        address = %log.address,
                        kind = %kind,
                        error = %e,
                        "Log enrichment failed"
                    ),
                }
            }
            tracing::debug!(block = number, events = out.len(), "Processed log batch");
            out
        }
        .instrument(self.span.clone())
        .await
    }

    fn last_block(&self) -> Option<u64> {
        self.last_block.load(Ordering::SeqCst).checked_sub(1)
    }
}
